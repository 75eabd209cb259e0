//! Rendering of the accepted relays.
//!
//! # Formats
//!
//! Plain:
//!
//! ```text
//! 1.2.3.4:443 ABCD...
//! ```
//!
//! torrc:
//!
//! ```text
//! Bridge 1.2.3.4:443 ABCD...
//! UseBridges 1
//! ```
//!
//! Tor Browser `prefs.js` (see [`update_prefs_js`]):
//!
//! ```text
//! user_pref("torbrowser.settings.bridges.bridge_strings.0", "1.2.3.4:443 ABCD...");
//! user_pref("torbrowser.settings.bridges.enabled", true);
//! user_pref("torbrowser.settings.bridges.source", 2);
//! ```

use std::io::Write;
use std::path::Path;

use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::plog_fmt;
use crate::relay::RelayCandidate;

/// Prefix shared by every Tor Browser bridge setting.
pub const PREFS_BRIDGE_KEY: &str = "torbrowser.settings.bridges.";

/// Renders bridge lines for every reachable address, in input order.
///
/// ```rust
/// use tor_relay_scanner::RelayCandidate;
/// use tor_relay_scanner::output::render;
///
/// let mut relay = RelayCandidate::new("ABCD", "us", vec!["1.2.3.4:443".into()]);
/// relay.reachable_addresses.push("1.2.3.4:443".into());
///
/// assert_eq!(render(&[relay.clone()], false), "1.2.3.4:443 ABCD\n");
/// assert_eq!(render(&[relay], true), "Bridge 1.2.3.4:443 ABCD\nUseBridges 1\n");
/// ```
pub fn render(accepted: &[RelayCandidate], torrc: bool) -> String {
    let prefix = if torrc { "Bridge " } else { "" };
    let mut out = String::new();
    for line in accepted.iter().flat_map(RelayCandidate::bridge_lines) {
        out.push_str(prefix);
        out.push_str(&line);
        out.push('\n');
    }
    if torrc {
        out.push_str("UseBridges 1\n");
    }
    out
}

/// Writes [`render`]'s output to `writer` and flushes it.
///
/// # Errors
///
/// Returns [`Error::Io`] if writing fails.
pub fn write_output<W: Write>(writer: &mut W, accepted: &[RelayCandidate], torrc: bool) -> Result<()> {
    let rendered = render(accepted, torrc);
    writer.write_all(rendered.as_bytes())?;
    writer.flush()?;
    for line in rendered.lines() {
        plog_fmt!(LogLevel::Debug, "Added to output: {}", line);
    }
    Ok(())
}

/// Rewrites `prefs_js` content with the accepted bridges.
///
/// Existing bridge settings are removed. Bridge strings are numbered with a
/// running index over all (relay, address) pairs.
pub fn rewrite_prefs(content: &str, accepted: &[RelayCandidate]) -> String {
    let mut lines: Vec<String> = content
        .split('\n')
        .filter(|line| !line.contains(PREFS_BRIDGE_KEY))
        .map(str::to_string)
        .collect();

    for (i, bridge) in accepted
        .iter()
        .flat_map(RelayCandidate::bridge_lines)
        .enumerate()
    {
        lines.push(format!(
            "user_pref(\"{}bridge_strings.{}\", \"{}\");",
            PREFS_BRIDGE_KEY, i, bridge
        ));
    }
    lines.push(format!("user_pref(\"{}enabled\", true);", PREFS_BRIDGE_KEY));
    lines.push(format!("user_pref(\"{}source\", 2);", PREFS_BRIDGE_KEY));

    lines.join("\n")
}

/// Updates a Tor Browser `prefs.js` in place.
///
/// # Errors
///
/// Returns [`Error::Prefs`] if the file does not exist, cannot be read, or
/// cannot be written.
pub fn update_prefs_js(path: &Path, accepted: &[RelayCandidate]) -> Result<()> {
    if !path.exists() {
        return Err(Error::Prefs(format!(
            "prefs.js file does not exist: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Prefs(format!("can't read {}: {}", path.display(), e)))?;

    std::fs::write(path, rewrite_prefs(&content, accepted))
        .map_err(|e| Error::Prefs(format!("can't write {}: {}", path.display(), e)))?;

    plog_fmt!(LogLevel::Notice, "Updated bridge settings in {}", path.display());
    Ok(())
}
