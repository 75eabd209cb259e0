//! Configuration management for tor-relay-scanner.
//!
//! This module provides configuration parsing from TOML files, command-line arguments,
//! and environment variables. Configuration is applied in order: defaults → config file →
//! command-line arguments, with later sources overriding earlier ones.
//!
//! # Configuration Flow
//!
//! ```text
//!     ┌─────────────────┐
//!     │ Config::default │ ◄── Start with defaults
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌──────────────────────┐
//!     │ Config file     │ ◄───│ relay-scanner.toml   │  (TOML format)
//!     │ exists?         │     │ or --config          │
//!     └────────┬────────┘     └──────────────────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐     ┌─────────────────┐
//!     │ Apply CLI args  │ ◄───│ -n, -g, -c, ... │
//!     │ (override)      │     └─────────────────┘
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ Validate        │
//!     └────────┬────────┘
//!              │
//!              ▼
//!     ┌─────────────────┐
//!     │ Final Config    │
//!     └─────────────────┘
//! ```
//!
//! # Example Configuration File
//!
//! ```toml
//! # Scan settings
//! num_relays = 30        # relays tested concurrently per attempt
//! goal = 5               # stop once this many reachable relays are found
//! timeout_secs = 10.0    # directory download and per-address dial timeout
//!
//! # Filtering
//! country = "us,de,!nl,-ru"
//! ports = ["443", "9001"]
//!
//! # Directory download
//! urls = ["https://example.org/details.json"]
//! # proxy = "http://127.0.0.1:8080"
//!
//! # Output
//! torrc = true
//! # outfile = "bridges.txt"
//! # prefs_js = "/path/to/profile/prefs.js"
//! start_browser = false
//! sink_file = "_bridges.txt"
//!
//! # Reproducible candidate order
//! # seed = 42
//!
//! # Logging
//! loglevel = "notice"
//! # logfile = "_scanner.log"
//! ```
//!
//! # See Also
//!
//! - [`LogLevel`] for logging configuration
//! - [`CliArgs`] for command-line argument parsing

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Log level for tor-relay-scanner output.
///
/// From most to least verbose:
/// [`Debug`](LogLevel::Debug) > [`Info`](LogLevel::Info) > [`Notice`](LogLevel::Notice) >
/// [`Warn`](LogLevel::Warn) > [`Error`](LogLevel::Error)
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::LogLevel;
///
/// let level = LogLevel::Notice;
/// assert!(level < LogLevel::Warn);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-address dial results and tested fingerprints.
    Debug,
    /// Informational messages about normal operation.
    Info,
    /// Notable events such as attempt progress and results.
    #[default]
    Notice,
    /// Warning conditions that don't stop the scan.
    Warn,
    /// Error conditions.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Notice => write!(f, "NOTICE"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "NOTICE" => Ok(LogLevel::Notice),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            _ => Err(Error::Config(format!("invalid log level: {}", s))),
        }
    }
}

/// Main configuration for a relay scan.
///
/// # Fields
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `num_relays` | 30 | Relays tested concurrently per attempt (batch size) |
/// | `goal` | 5 | Stop once at least this many reachable relays are found |
/// | `timeout_secs` | 10.0 | Directory download and dial timeout |
/// | `country` | `""` | Country rule, e.g. `us,!de,-ru` |
/// | `ports` | `[]` | Only keep addresses on these ports |
/// | `urls` | `[]` | Extra directory URLs tried before the built-in ones |
/// | `proxy` | none | Proxy for the directory download |
/// | `outfile` | stdout | Output file for reachable relays |
/// | `torrc` | false | Emit `Bridge` lines and `UseBridges 1` |
/// | `prefs_js` | none | Tor Browser `prefs.js` to rewrite |
/// | `start_browser` | false | Launch Tor Browser after scanning |
/// | `sink_file` | `_bridges.txt` | Append-only file receiving results in real time |
/// | `seed` | none | Seed for the candidate shuffle |
/// | `loglevel` | notice | Log verbosity |
/// | `logfile` | stderr | Log destination |
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::Config;
///
/// let mut config = Config::default();
/// config.goal = 10;
/// config.ports = vec!["443".to_string()];
/// assert!(config.validate().is_ok());
///
/// config.num_relays = 0;
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Number of relays tested concurrently per attempt.
    #[serde(default = "default_num_relays")]
    pub num_relays: usize,
    /// Test until at least this number of working relays are found.
    #[serde(default = "default_goal")]
    pub goal: usize,
    /// Socket connection and download timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Preferred/excluded/exclusive country rule.
    #[serde(default)]
    pub country: String,
    /// Ports to keep when narrowing relay addresses.
    #[serde(default)]
    pub ports: Vec<String>,
    /// Additional directory URLs, tried before the built-in mirrors.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Proxy URL for the directory download.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Output file. None for stdout.
    #[serde(default)]
    pub outfile: Option<PathBuf>,
    /// Output in torrc format.
    #[serde(default)]
    pub torrc: bool,
    /// Path to Tor Browser prefs.js.
    #[serde(default)]
    pub prefs_js: Option<PathBuf>,
    /// Launch Tor Browser after scanning.
    #[serde(default)]
    pub start_browser: bool,
    /// Append-only file receiving reachable addresses as they are found.
    #[serde(default = "default_sink_file")]
    pub sink_file: PathBuf,
    /// Seed for the candidate shuffle. None for a random order.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Log level for output.
    #[serde(default)]
    pub loglevel: LogLevel,
    /// Log file path. None for stderr, ":syslog:" for syslog.
    #[serde(default)]
    pub logfile: Option<String>,
}

fn default_num_relays() -> usize {
    30
}
fn default_goal() -> usize {
    5
}
fn default_timeout_secs() -> f64 {
    10.0
}
fn default_sink_file() -> PathBuf {
    PathBuf::from("_bridges.txt")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_relays: default_num_relays(),
            goal: default_goal(),
            timeout_secs: default_timeout_secs(),
            country: String::new(),
            ports: Vec::new(),
            urls: Vec::new(),
            proxy: None,
            outfile: None,
            torrc: false,
            prefs_js: None,
            start_browser: false,
            sink_file: default_sink_file(),
            seed: None,
            loglevel: LogLevel::default(),
            logfile: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    /// Returns [`Error::Config`] if the TOML is invalid.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the batch size or goal is zero, the timeout
    /// is not a positive finite number, or a port is not a valid port number.
    pub fn validate(&self) -> Result<()> {
        if self.num_relays == 0 {
            return Err(Error::Config("num_relays must be positive".to_string()));
        }
        if self.goal == 0 {
            return Err(Error::Config("goal must be positive".to_string()));
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(Error::Config(
                "timeout_secs must be a positive number".to_string(),
            ));
        }
        for port in &self.ports {
            if port.trim().parse::<u16>().is_err() {
                return Err(Error::Config(format!("invalid port: {}", port)));
            }
        }
        Ok(())
    }

    /// Timeout shared by the directory download and every dial.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_timeout_secs()))
    }
}

/// Command-line arguments for tor-relay-scanner.
///
/// Arguments override configuration file values.
///
/// # Usage
///
/// ```text
/// tor-relay-scanner [OPTIONS]
/// ```
///
/// # Examples
///
/// Find 5 reachable relays and print them in torrc format:
/// ```bash
/// tor-relay-scanner --torrc
/// ```
///
/// Prefer US relays, never test Russian ones, only port 443:
/// ```bash
/// tor-relay-scanner -c us,-ru -p 443
/// ```
///
/// Write bridges straight into a Tor Browser profile and launch it:
/// ```bash
/// tor-relay-scanner --browser Browser/TorBrowser/Data/Browser/profile.default/prefs.js --start-browser
/// ```
#[derive(Parser, Debug)]
#[command(name = "tor-relay-scanner")]
#[command(about = "Find reachable Tor relays to use as bridges")]
#[command(version)]
#[command(
    long_about = "tor-relay-scanner downloads the public Tor relay list, tests relays \
    concurrently for TCP reachability, and prints the reachable ones as bridge lines \
    for torrc or Tor Browser."
)]
pub struct CliArgs {
    /// Number of concurrent relays tested.
    #[arg(short = 'n', long = "num-relays")]
    pub num_relays: Option<usize>,

    /// Test until at least this number of working relays are found.
    #[arg(short = 'g', long = "goal")]
    pub goal: Option<usize>,

    /// Preferred/excluded/exclusive country list, comma-separated (e.g. us,!ca,-ru).
    #[arg(short = 'c', long = "country")]
    pub country: Option<String>,

    /// Socket connection timeout in seconds.
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Output file for reachable relays (default: stdout).
    #[arg(short = 'o', long = "outfile")]
    pub outfile: Option<PathBuf>,

    /// Output in torrc format.
    #[arg(long)]
    pub torrc: bool,

    /// Proxy for the relay list download (e.g. http://proxy:port).
    #[arg(long)]
    pub proxy: Option<String>,

    /// Comma-separated list of alternative directory URLs.
    #[arg(long = "url", value_delimiter = ',')]
    pub urls: Vec<String>,

    /// Comma-separated list of ports to filter (e.g. 443,9001).
    #[arg(short = 'p', long = "port", value_delimiter = ',')]
    pub ports: Vec<String>,

    /// Path to Tor Browser prefs.js to update with the found bridges.
    #[arg(long = "browser")]
    pub prefs_js: Option<PathBuf>,

    /// Launch Tor Browser after scanning.
    #[arg(long)]
    pub start_browser: bool,

    /// Append-only file receiving reachable relays as they are found.
    #[arg(long = "sink")]
    pub sink_file: Option<PathBuf>,

    /// Seed for the random relay order.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write default config to file and exit.
    #[arg(long = "generate_config")]
    pub generate_config: Option<PathBuf>,

    /// Log verbosity (DEBUG, INFO, NOTICE, WARN, ERROR).
    #[arg(long)]
    pub loglevel: Option<String>,

    /// Log to file instead of stderr (use ":syslog:" for syslog).
    #[arg(long)]
    pub logfile: Option<String>,

    /// Path to configuration file.
    #[arg(
        long = "config",
        env = "RELAY_SCANNER_CONFIG",
        default_value = "relay-scanner.toml"
    )]
    pub config_file: PathBuf,
}

impl CliArgs {
    /// Apply CLI arguments to a configuration, overriding values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `--loglevel` is not a known level.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(num_relays) = self.num_relays {
            config.num_relays = num_relays;
        }
        if let Some(goal) = self.goal {
            config.goal = goal;
        }
        if let Some(ref country) = self.country {
            config.country = country.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(ref outfile) = self.outfile {
            config.outfile = Some(outfile.clone());
        }
        if self.torrc {
            config.torrc = true;
        }
        if let Some(ref proxy) = self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if !self.urls.is_empty() {
            config.urls = non_empty(&self.urls);
        }
        if !self.ports.is_empty() {
            config.ports = non_empty(&self.ports);
        }
        if let Some(ref prefs_js) = self.prefs_js {
            config.prefs_js = Some(prefs_js.clone());
        }
        if self.start_browser {
            config.start_browser = true;
        }
        if let Some(ref sink_file) = self.sink_file {
            config.sink_file = sink_file.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(ref loglevel) = self.loglevel {
            config.loglevel = loglevel.parse()?;
        }
        if let Some(ref logfile) = self.logfile {
            config.logfile = Some(logfile.clone());
        }
        Ok(())
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Load configuration from file and CLI arguments.
///
/// 1. Start with defaults
/// 2. Apply config file if it exists
/// 3. Apply CLI arguments (override)
///
/// # Errors
///
/// Returns [`Error::Config`] if configuration is invalid.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = Config::default();

    if args.config_file.exists() {
        config = Config::from_file(&args.config_file)?;
    }

    args.apply_to(&mut config)?;
    config.validate()?;

    Ok(config)
}
