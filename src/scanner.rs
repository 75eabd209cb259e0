//! End-to-end scan pipeline.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ fetch_relays │──▶│ shuffle │──▶│ filter   │──▶│ scheduler  │──▶│ output   │
//! │ (directory)  │   │ (seed)  │   │ (policy) │   │ + prober   │   │ prefs.js │
//! └──────────────┘   └─────────┘   └──────────┘   └─────┬──────┘   └──────────┘
//!                                                       │
//!                                                       ▼
//!                                                 _bridges.txt
//! ```
//!
//! Fatal conditions (all directory sources failing, nothing left after
//! filtering, sink or output file not opening) stop the pipeline before any
//! relay is probed. A scan that finds nothing ends successfully.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::browser::start_browser;
use crate::config::{Config, LogLevel};
use crate::directory::{directory_urls, fetch_relays};
use crate::error::{Error, Result};
use crate::logger::plog;
use crate::output::{update_prefs_js, write_output};
use crate::plog_fmt;
use crate::policy::{filter_and_sort, CountryPolicy};
use crate::prober::{Dialer, ProbeContext, TcpDialer};
use crate::relay::RelayCandidate;
use crate::scheduler::{self, shuffle_candidates, ScanOptions, ScanReport};
use crate::sink::BridgeSink;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shuffles, filters and probes already-fetched relays.
///
/// Results are appended to `config.sink_file` as they are found.
///
/// # Errors
///
/// Returns [`Error::NoCandidates`] if nothing survives the policy, and
/// [`Error::Io`] if the sink cannot be opened.
pub async fn scan<D: Dialer>(
    config: &Config,
    mut relays: Vec<RelayCandidate>,
    dialer: Arc<D>,
) -> Result<ScanReport> {
    shuffle_candidates(&mut relays, config.seed);

    let policy = CountryPolicy::parse(&config.country);
    let candidates = filter_and_sort(relays, &policy, &config.ports);
    if candidates.is_empty() {
        return Err(Error::NoCandidates);
    }
    plog_fmt!(LogLevel::Info, "{} relays match the specified criteria", candidates.len());

    let sink = BridgeSink::open(&config.sink_file).await?;
    let ctx = ProbeContext::new(dialer, Arc::new(sink), config.timeout());

    scheduler::run(candidates, &ScanOptions::from(config), &ctx).await
}

/// Runs the full scan described by `config`.
///
/// # Errors
///
/// Returns any fatal error of the pipeline. A [`Error::Prefs`] failure is
/// returned only after the plain/torrc output has been written.
pub async fn run_main(config: Config) -> Result<()> {
    let mut output: Box<dyn Write + Send> = match config.outfile {
        Some(ref path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    plog_fmt!(
        LogLevel::Notice,
        "Tor Relay Scanner. Will scan up to {} working relays",
        config.goal,
    );
    plog(
        LogLevel::Notice,
        "Downloading Tor Relay information from Tor Metrics...",
    );
    let urls = directory_urls(&config.urls);
    let relays = fetch_relays(&urls, config.timeout(), config.proxy.as_deref()).await?;
    plog(LogLevel::Notice, "Done!");

    let report = scan(&config, relays, Arc::new(TcpDialer)).await?;

    plog_fmt!(
        LogLevel::Notice,
        "Scan {} after {} attempts: {} of {} tested relays reachable ({} addresses) in {}s",
        report.state,
        report.batches_run,
        report.accepted.len(),
        report.candidates_tested,
        report.reachable_addresses(),
        report.elapsed().num_seconds(),
    );

    emit_results(&config, &report, &mut output)?;

    if config.start_browser {
        if let Err(e) = start_browser(Path::new(".")) {
            plog(LogLevel::Warn, &e.to_string());
        }
    }

    Ok(())
}

/// Writes the accepted relays to `output`, then rewrites `prefs.js` if one
/// is configured.
///
/// Nothing is written when no relay was reachable.
///
/// # Errors
///
/// Returns [`Error::Io`] if `output` fails, and [`Error::Prefs`] if the
/// `prefs.js` rewrite fails. In the latter case `output` already holds the
/// full rendering.
pub fn emit_results<W: Write>(
    config: &Config,
    report: &ScanReport,
    output: &mut W,
) -> Result<()> {
    if report.accepted.is_empty() {
        plog(LogLevel::Notice, "No reachable relays found.");
        return Ok(());
    }

    write_output(output, &report.accepted, config.torrc)?;
    if let Some(ref prefs_js) = config.prefs_js {
        update_prefs_js(prefs_js, &report.accepted)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::testing::ScriptedDialer;
    use tokio::net::TcpListener;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        Config {
            num_relays: 2,
            goal: 1,
            timeout_secs: 2.0,
            sink_file: dir.path().join("_bridges.txt"),
            seed: Some(99),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_scan_filters_everything_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            country: "!nl".to_string(),
            ..config_in(&dir)
        };
        let relays = vec![RelayCandidate::new("AAAA", "us", vec!["1.1.1.1:443".into()])];

        let result = scan(&config, relays, Arc::new(ScriptedDialer::default())).await;
        assert!(matches!(result, Err(Error::NoCandidates)));
        assert!(!config.sink_file.exists());
    }

    #[tokio::test]
    async fn test_scan_is_reproducible_with_seed() {
        let relays: Vec<RelayCandidate> = (0..20)
            .map(|i| RelayCandidate::new(format!("{:0>40X}", i), "", vec![format!("r{}:443", i)]))
            .collect();
        let reachable: Vec<String> = (0..20).step_by(3).map(|i| format!("r{}:443", i)).collect();

        let mut orders = Vec::new();
        for _ in 0..2 {
            let dir = tempfile::tempdir().unwrap();
            let config = Config {
                goal: 3,
                num_relays: 4,
                ..config_in(&dir)
            };
            let dialer = Arc::new(ScriptedDialer::reaching(reachable.clone()));
            let report = scan(&config, relays.clone(), dialer).await.unwrap();
            let order: Vec<String> = report
                .accepted
                .iter()
                .map(|r| r.fingerprint.clone())
                .collect();
            orders.push(order);
        }
        assert_eq!(orders[0], orders[1]);
    }

    #[tokio::test]
    async fn test_scan_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };

        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        let relays = vec![
            RelayCandidate::new("OPEN", "de", vec![open.clone()]),
            RelayCandidate::new("CLOSED", "de", vec![closed]),
        ];

        let report = scan(&config, relays, Arc::new(TcpDialer)).await.unwrap();

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].fingerprint, "OPEN");
        let sink = std::fs::read_to_string(&config.sink_file).unwrap();
        assert_eq!(sink, format!("{} OPEN\n", open));
    }

    fn report_with(accepted: Vec<RelayCandidate>) -> ScanReport {
        let now = chrono::Utc::now();
        ScanReport {
            accepted,
            state: scheduler::ScanState::GoalReached,
            batches_run: 1,
            candidates_tested: 2,
            stats: Default::default(),
            started_at: now,
            finished_at: now,
        }
    }

    fn reached(fp: &str, addresses: &[&str]) -> RelayCandidate {
        let addresses: Vec<String> = addresses.iter().map(|a| a.to_string()).collect();
        let mut relay = RelayCandidate::new(fp, "de", addresses.clone());
        relay.reachable_addresses = addresses;
        relay
    }

    #[test]
    fn test_prefs_failure_keeps_written_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            torrc: true,
            prefs_js: Some(dir.path().join("missing").join("prefs.js")),
            ..config_in(&dir)
        };
        let report = report_with(vec![
            reached("AAAA", &["1.2.3.4:443", "[2001:db8::1]:9001"]),
            reached("BBBB", &["5.6.7.8:9001"]),
        ]);

        let mut output = Vec::new();
        let result = emit_results(&config, &report, &mut output);

        assert!(matches!(result, Err(Error::Prefs(_))));
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Bridge 1.2.3.4:443 AAAA\n\
             Bridge [2001:db8::1]:9001 AAAA\n\
             Bridge 5.6.7.8:9001 BBBB\n\
             UseBridges 1\n"
        );
    }

    #[test]
    fn test_emit_results_rewrites_prefs() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = dir.path().join("prefs.js");
        std::fs::write(&prefs, "user_pref(\"network.proxy.socks_port\", 9150);\n").unwrap();
        let config = Config {
            prefs_js: Some(prefs.clone()),
            ..config_in(&dir)
        };
        let report = report_with(vec![reached("AAAA", &["1.2.3.4:443"])]);

        let mut output = Vec::new();
        emit_results(&config, &report, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "1.2.3.4:443 AAAA\n");
        let content = std::fs::read_to_string(&prefs).unwrap();
        assert!(content.contains("1.2.3.4:443 AAAA"));
    }

    #[test]
    fn test_emit_results_with_nothing_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            torrc: true,
            prefs_js: Some(dir.path().join("missing.js")),
            ..config_in(&dir)
        };

        let mut output = Vec::new();
        emit_results(&config, &report_with(Vec::new()), &mut output).unwrap();
        assert!(output.is_empty());
    }
}
