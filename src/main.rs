//! tor-relay-scanner CLI application entry point.
//!
//! # Startup Flow
//!
//! ```text
//!   ┌─────────────────┐
//!   │  Parse CLI Args │ ◄── clap parses command-line arguments
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌──────────────────┐      ┌─────────────────┐
//!   │ --generate_config│────▶ │ Write default   │────▶ Exit
//!   │    specified?    │      │ config & exit   │
//!   └────────┬─────────┘      └─────────────────┘
//!            │ No
//!            ▼
//!   ┌─────────────────┐
//!   │  Load Config    │ ◄── Defaults → File → CLI
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ Initialize      │ ◄── tracing subscriber on stderr/file/syslog
//!   │   Logging       │
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │ Run Scan        │ ◄── scanner::run_main()
//!   └─────────────────┘
//! ```
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success, including scans that found no reachable relays |
//! | 1 | Error (see stderr for details) |
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `RELAY_SCANNER_CONFIG` | Path to config file (equivalent to `--config`) |
//! | `RUST_LOG` | Overrides the configured log filter |

use clap::Parser;
use std::process::ExitCode;

use tor_relay_scanner::{config, logger, plog_fmt, scanner, CliArgs, Config, LogLevel};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> tor_relay_scanner::Result<()> {
    let args = CliArgs::parse();

    if let Some(ref output_path) = args.generate_config {
        let config = Config::default();
        let toml = config.to_toml()?;
        std::fs::write(output_path, toml)?;
        println!("Wrote default config to {}", output_path.display());
        return Ok(());
    }

    let config = config::load_config(&args)?;

    logger::init(config.loglevel, config.logfile.as_deref())?;

    plog_fmt!(LogLevel::Notice, "tor-relay-scanner {} starting", scanner::VERSION);
    plog_fmt!(LogLevel::Debug, "Sink file: {}", config.sink_file.display());
    if !config.country.is_empty() {
        plog_fmt!(LogLevel::Info, "Country rule: {}", config.country);
    }
    if !config.ports.is_empty() {
        plog_fmt!(LogLevel::Info, "Ports: {}", config.ports.join(","));
    }
    if let Some(seed) = config.seed {
        plog_fmt!(LogLevel::Info, "Shuffle seed: {}", seed);
    }

    scanner::run_main(config).await
}
