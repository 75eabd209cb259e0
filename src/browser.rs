//! Tor Browser launcher.
//!
//! Looks for a Tor Browser bundle next to the working directory and starts
//! it detached. The scan result never depends on this succeeding.

use std::path::Path;
use std::process::Command;

use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::plog_fmt;

/// Launch commands tried in order, relative to the bundle directory.
pub const BROWSER_COMMANDS: [&[&str]; 2] = [
    &["Browser/start-tor-browser", "--detach"],
    &["Browser/firefox.exe"],
];

/// Starts the first launcher found under `base_dir`.
///
/// # Errors
///
/// Returns [`Error::Browser`] if no launcher exists or none could be spawned.
pub fn start_browser(base_dir: &Path) -> Result<()> {
    for command in BROWSER_COMMANDS {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        let program = base_dir.join(program);
        if !program.exists() {
            continue;
        }

        match Command::new(&program).args(args).spawn() {
            Ok(_) => {
                plog_fmt!(
                    LogLevel::Notice,
                    "Successfully started browser with {}",
                    program.display(),
                );
                return Ok(());
            }
            Err(e) => {
                plog_fmt!(
                    LogLevel::Warn,
                    "Failed to start browser with {}: {}",
                    program.display(),
                    e,
                );
            }
        }
    }

    Err(Error::Browser("no valid browser executable found".to_string()))
}
