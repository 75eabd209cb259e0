//! Error types for tor-relay-scanner.
//!
//! This module defines the [`enum@Error`] enum representing every failure that can
//! stop a scan or one of its output stages.
//!
//! # Error Categories
//!
//! ```text
//!   Error
//!   ├── Io            ◄── Sink/output file failures
//!   ├── Config        ◄── Invalid configuration, CLI values, proxy URL
//!   ├── Fetch         ◄── Every directory source failed
//!   ├── Directory     ◄── A single directory document failed to decode
//!   ├── NoCandidates  ◄── Nothing left to probe
//!   ├── Prefs         ◄── Tor Browser prefs.js could not be updated
//!   └── Browser       ◄── No browser executable could be started
//! ```
//!
//! # When Errors Happen
//!
//! | Error | Stage | Fatal |
//! |-------|-------|-------|
//! | [`Config`](Error::Config) | Startup | Yes |
//! | [`Fetch`](Error::Fetch) | Startup | Yes |
//! | [`NoCandidates`](Error::NoCandidates) | Startup | Yes |
//! | [`Io`](Error::Io) | Startup (sink, output) | Yes |
//! | [`Prefs`](Error::Prefs) | Output | Yes, after plain output is written |
//! | [`Browser`](Error::Browser) | After output | No, only logged |
//!
//! Individual dial failures are never represented here. The prober absorbs
//! them as [`ProbeOutcome`](crate::prober::ProbeOutcome) values.
//!
//! # Example
//!
//! ```rust
//! use tor_relay_scanner::{Error, policy::{filter_and_sort, CountryPolicy}};
//!
//! let policy = CountryPolicy::parse("!us");
//! let survivors = filter_and_sort(Vec::new(), &policy, &[]);
//! let result: tor_relay_scanner::Result<()> = if survivors.is_empty() {
//!     Err(Error::NoCandidates)
//! } else {
//!     Ok(())
//! };
//! assert!(matches!(result, Err(Error::NoCandidates)));
//! ```

use thiserror::Error;

/// Errors that can occur during a relay scan.
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::Error;
///
/// fn is_startup_failure(err: &Error) -> bool {
///     matches!(err, Error::Fetch(_) | Error::NoCandidates | Error::Config(_))
/// }
///
/// assert!(is_startup_failure(&Error::NoCandidates));
/// assert!(!is_startup_failure(&Error::Browser("missing".into())));
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while opening or writing the sink or output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    ///
    /// Raised for invalid configuration files, out-of-range values, an
    /// unparseable proxy URL, or a logger that cannot be installed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Relay directory could not be downloaded from any source.
    ///
    /// # Recovery
    ///
    /// - Pass additional mirrors with `--url`
    /// - Route the download through `--proxy`
    /// - Increase `--timeout`
    #[error("failed to download relay data: {0}")]
    Fetch(String),

    /// A directory document was received but could not be decoded.
    #[error("invalid relay directory: {0}")]
    Directory(#[from] serde_json::Error),

    /// No candidates remain to be tested.
    ///
    /// Returned when the country/port policy filters out every relay, or when
    /// the scheduler is started with an empty candidate list.
    #[error("no relays match the specified criteria")]
    NoCandidates,

    /// Tor Browser preferences file could not be updated.
    ///
    /// Already-written plain or torrc output is kept.
    #[error("prefs.js error: {0}")]
    Prefs(String),

    /// Tor Browser could not be launched.
    #[error("browser start failed: {0}")]
    Browser(String),
}

/// Result type alias for tor-relay-scanner operations.
pub type Result<T> = std::result::Result<T, Error>;
