//! Logging infrastructure for tor-relay-scanner.
//!
//! This module provides logging functionality using the tracing ecosystem.
//! Log records go to stderr by default so that stdout stays reserved for
//! bridge lines; a file or syslog can be chosen instead.
//!
//! # Log Levels
//!
//! | Level | Use |
//! |-------|-----|
//! | [`Debug`](crate::LogLevel::Debug) | Per-address dial failures, tested fingerprints |
//! | [`Info`](crate::LogLevel::Info) | Directory source details |
//! | [`Notice`](crate::LogLevel::Notice) | Attempt progress and reachable relays (default) |
//! | [`Warn`](crate::LogLevel::Warn) | Mirror failures, sink write failures |
//! | [`Error`](crate::LogLevel::Error) | Fatal conditions |
//!
//! # Example
//!
//! ```rust,no_run
//! use tor_relay_scanner::{LogLevel, logger};
//!
//! logger::init(LogLevel::Notice, None).unwrap();
//! logger::plog(LogLevel::Notice, "Tor Relay Scanner starting");
//!
//! // Log to a file, like the classic _scanner.log
//! logger::init(LogLevel::Debug, Some("_scanner.log")).unwrap();
//! ```

use std::io::Write;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{Error, Result};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

const SYSLOG_SOCKETS: [&str; 2] = ["/dev/log", "/var/run/syslog"];

/// Where log records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget<'a> {
    Stderr,
    Syslog,
    File(&'a str),
}

impl<'a> LogTarget<'a> {
    fn from_logfile(logfile: Option<&'a str>) -> Self {
        match logfile {
            None | Some("") => LogTarget::Stderr,
            Some(":syslog:") => LogTarget::Syslog,
            Some(path) => LogTarget::File(path),
        }
    }

    /// Builds the writer; only stderr gets ANSI colors.
    fn make_writer(self) -> Result<(BoxMakeWriter, bool)> {
        match self {
            LogTarget::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), true)),
            LogTarget::Syslog => {
                let socket = SYSLOG_SOCKETS
                    .into_iter()
                    .find(|p| Path::new(p).exists())
                    .ok_or_else(|| Error::Config("no syslog socket found".to_string()))?;
                Ok((
                    BoxMakeWriter::new(move || SyslogWriter::connect(socket)),
                    false,
                ))
            }
            LogTarget::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Ok((BoxMakeWriter::new(Mutex::new(file)), false))
            }
        }
    }
}

/// `EnvFilter` directive for a configured level. Notice maps onto info.
fn filter_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info | LogLevel::Notice => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// Initialize the logging system.
///
/// Subsequent calls are no-ops.
///
/// # Arguments
///
/// * `level` - The minimum log level to output
/// * `logfile` - Output destination:
///   - `None` - Log to stderr with ANSI colors
///   - `Some(":syslog:")` - Log to system syslog
///   - `Some(path)` - Append to the file at the specified path
///
/// # Errors
///
/// Returns [`Error::Io`] if the log file cannot be opened.
///
/// Returns [`Error::Config`] if no syslog socket exists or the tracing
/// subscriber cannot be installed.
///
/// The `RUST_LOG` environment variable overrides the configured level.
pub fn init(level: LogLevel, logfile: Option<&str>) -> Result<()> {
    if LOGGER_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let (writer, ansi) = LogTarget::from_logfile(logfile).make_writer()?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("failed to set logger: {}", e)))?;

    LOGGER_INITIALIZED.get_or_init(|| ());
    Ok(())
}

/// One datagram per record. Records are dropped if the socket is gone.
struct SyslogWriter {
    socket: Option<UnixDatagram>,
}

impl SyslogWriter {
    fn connect(path: &str) -> Self {
        let socket = UnixDatagram::unbound()
            .and_then(|sock| sock.connect(path).map(|()| sock))
            .ok();
        SyslogWriter { socket }
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(ref socket) = self.socket {
            let msg = format!("tor-relay-scanner: {}", String::from_utf8_lossy(buf));
            socket.send(msg.as_bytes())?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Log a message at the specified level.
///
/// | LogLevel | tracing macro |
/// |----------|---------------|
/// | Debug | `debug!` |
/// | Info | `info!` |
/// | Notice | `info!` |
/// | Warn | `warn!` |
/// | Error | `error!` |
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::{LogLevel, logger};
///
/// logger::plog(LogLevel::Notice, "Downloading Tor Relay information from Tor Metrics...");
/// logger::plog(LogLevel::Warn, "Can't download Tor Relay data from mirror");
/// ```
pub fn plog(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Notice => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
        LogLevel::Error => error!("{}", message),
    }
}

/// Log a formatted message at the specified level.
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::{LogLevel, plog_fmt};
///
/// plog_fmt!(LogLevel::Notice, "Attempt {}/{}, Testing {} random relays:", 1, 4, 30);
/// ```
#[macro_export]
macro_rules! plog_fmt {
    ($level:expr, $($arg:tt)*) => {
        $crate::logger::plog($level, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_target_from_logfile() {
        assert_eq!(LogTarget::from_logfile(None), LogTarget::Stderr);
        assert_eq!(LogTarget::from_logfile(Some("")), LogTarget::Stderr);
        assert_eq!(LogTarget::from_logfile(Some(":syslog:")), LogTarget::Syslog);
        assert_eq!(
            LogTarget::from_logfile(Some("_scanner.log")),
            LogTarget::File("_scanner.log")
        );
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Notice), "info");
        assert_eq!(filter_directive(LogLevel::Info), "info");
        assert_eq!(filter_directive(LogLevel::Warn), "warn");
    }

    #[test]
    fn test_file_target_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_scanner.log");
        std::fs::write(&path, "earlier\n").unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let (_writer, ansi) = LogTarget::File(&path_str).make_writer().unwrap();
        assert!(!ansi);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\n");
    }

    #[test]
    fn test_file_target_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("_scanner.log");
        let path_str = path.to_string_lossy().into_owned();
        assert!(matches!(
            LogTarget::File(&path_str).make_writer(),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_syslog_writer_without_socket_drops_records() {
        let mut writer = SyslogWriter::connect("/nonexistent/syslog.sock");
        assert!(writer.socket.is_none());
        assert_eq!(writer.write(b"dropped").unwrap(), 7);
    }
}
