//! # tor-relay-scanner
//!
//! Finds Tor relays that are reachable from the current network, so they can
//! be used as bridges where Tor's directory authorities or public relays are
//! blocked.
//!
//! # Overview
//!
//! The scanner downloads the public relay list, applies a country and port
//! policy, and dials relay addresses concurrently in batches until enough
//! reachable relays are found:
//!
//! - **Directory download** ([`directory`]): Onionoo documents from an ordered mirror list
//! - **Policy** ([`policy`]): exclusive/excluded/preferred countries, port allow-list
//! - **Probing** ([`prober`]): one TCP connect per address, all addresses of a batch at once
//! - **Scheduling** ([`scheduler`]): sequential batches until the goal is reached
//! - **Output** ([`output`]): plain lines, torrc `Bridge` lines, Tor Browser `prefs.js`
//!
//! ## Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Configuration management (TOML, CLI, environment) |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`relay`] | [`RelayCandidate`] and address parsing |
//! | [`directory`] | Relay directory download |
//! | [`policy`] | Country and port filtering |
//! | [`sink`] | Append-only file of reachable relays |
//! | [`prober`] | Concurrent reachability checks for one batch |
//! | [`scheduler`] | Batch loop and stop condition |
//! | [`output`] | Result rendering and `prefs.js` rewrite |
//! | [`browser`] | Tor Browser launcher |
//! | [`scanner`] | End-to-end pipeline used by the CLI |
//! | [`logger`] | Logging infrastructure using tracing |
//!
//! # Quick Start
//!
//! ## As a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tor_relay_scanner::{directory, prober::TcpDialer, scanner, Config};
//!
//! #[tokio::main]
//! async fn main() -> tor_relay_scanner::Result<()> {
//!     let config = Config::default();
//!     let urls = directory::directory_urls(&config.urls);
//!     let relays = directory::fetch_relays(&urls, config.timeout(), None).await?;
//!
//!     let report = scanner::scan(&config, relays, Arc::new(TcpDialer)).await?;
//!     print!("{}", tor_relay_scanner::output::render(&report.accepted, true));
//!     Ok(())
//! }
//! ```
//!
//! ## As a CLI Application
//!
//! ```bash
//! # Find 5 reachable relays, print them as torrc lines
//! tor-relay-scanner --torrc
//!
//! # 50 relays per attempt, stop at 10, only port 443, prefer Germany, skip Russia
//! tor-relay-scanner -n 50 -g 10 -p 443 -c de,-ru
//!
//! # Generate default configuration file
//! tor-relay-scanner --generate_config relay-scanner.toml
//! ```
//!
//! # Scan Semantics
//!
//! - Every batch runs to completion. The goal is checked between batches, so
//!   the final count can exceed the goal.
//! - Each reachable address is appended to the sink file (`_bridges.txt` by
//!   default) as soon as it is found.
//! - The accepted relays keep the shuffled candidate order, so a fixed
//!   `--seed` reproduces the same output for the same network conditions.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod browser;
pub mod config;
pub mod directory;
pub mod error;
pub mod logger;
pub mod output;
pub mod policy;
pub mod prober;
pub mod relay;
pub mod scanner;
pub mod scheduler;
pub mod sink;

pub use config::{load_config, CliArgs, Config, LogLevel};
pub use error::{Error, Result};
pub use policy::{filter_and_sort, CountryPolicy};
pub use prober::{
    probe_address, probe_batch, BatchResult, BatchStats, Dialer, ProbeContext, ProbeOutcome,
    TcpDialer,
};
pub use relay::{parse_address, DirectoryDocument, RelayCandidate};
pub use scanner::{run_main, scan, VERSION};
pub use scheduler::{shuffle_candidates, ScanOptions, ScanReport, ScanState};
pub use sink::BridgeSink;
