//! Concurrent reachability probing of one batch of relays.
//!
//! # Overview
//!
//! [`probe_batch`] dials every address of every relay in a batch at the
//! same time, one task per address, and waits for all of them before
//! returning.
//!
//! ```text
//!   batch ─┬─ relay 0 ─┬─ addr 0 ──▶ task ──┐
//!          │           └─ addr 1 ──▶ task ──┤
//!          ├─ relay 1 ──── addr 0 ──▶ task ──┤   success: sink.append()
//!          └─ relay 2 ─┬─ addr 0 ──▶ task ──┤
//!                      └─ addr 1 ──▶ task ──┤
//!                                           ▼
//!                                  join barrier (JoinSet)
//!                                           │
//!                                           ▼
//!                     fold into reachable_addresses, input order
//! ```
//!
//! A success is written to the [`BridgeSink`] from inside the task, before
//! the rest of the batch finishes. Failures (refused, timed out,
//! unreachable) are per-address outcomes and never abort the batch.
//!
//! Completion order is not observable in the result: reachable addresses
//! are folded back by (relay index, address index) once every task has
//! joined, and only the calling task mutates the batch.
//!
//! # Dialers
//!
//! The [`Dialer`] trait is the seam between the batch logic and the
//! network. [`TcpDialer`] performs a plain TCP connect and closes the socket
//! immediately with linger disabled; nothing is sent.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::config::LogLevel;
use crate::plog_fmt;
use crate::relay::RelayCandidate;
use crate::sink::BridgeSink;

/// Connection-level reachability check for one address.
///
/// The prober applies the timeout, so implementations may take as long as
/// they like.
pub trait Dialer: Send + Sync + 'static {
    /// Returns `Ok(())` if `address` accepted a connection.
    fn dial(&self, address: &str) -> impl Future<Output = io::Result<()>> + Send;
}

/// TCP connect probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    async fn dial(&self, address: &str) -> io::Result<()> {
        let stream = TcpStream::connect(address).await?;
        // Zero linger resets the connection on drop without blocking.
        #[allow(deprecated)]
        stream.set_linger(Some(Duration::ZERO))?;
        drop(stream);
        Ok(())
    }
}

/// Result of probing a single address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The connection was accepted.
    Reachable,
    /// The peer actively refused the connection.
    Refused,
    /// No answer within the timeout.
    TimedOut,
    /// Any other failure (unreachable network, resolution failure, ...).
    Failed(String),
}

impl ProbeOutcome {
    /// Returns true for [`ProbeOutcome::Reachable`].
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// Per-batch probe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Addresses dialed.
    pub attempted: usize,
    /// Addresses that accepted a connection.
    pub reachable: usize,
    /// Addresses that refused the connection.
    pub refused: usize,
    /// Addresses that did not answer in time.
    pub timed_out: usize,
    /// Addresses that failed for any other reason, including crashed tasks.
    pub failed: usize,
}

impl BatchStats {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.attempted += 1;
        match outcome {
            ProbeOutcome::Reachable => self.reachable += 1,
            ProbeOutcome::Refused => self.refused += 1,
            ProbeOutcome::TimedOut => self.timed_out += 1,
            ProbeOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Adds another batch's counters to this one.
    pub fn merge(&mut self, other: &BatchStats) {
        self.attempted += other.attempted;
        self.reachable += other.reachable;
        self.refused += other.refused;
        self.timed_out += other.timed_out;
        self.failed += other.failed;
    }
}

/// Everything a probing task needs: the dialer, the shared sink, and the
/// per-dial timeout.
#[derive(Debug)]
pub struct ProbeContext<D> {
    /// Dialer shared by all tasks.
    pub dialer: Arc<D>,
    /// Append-only sink shared by all tasks.
    pub sink: Arc<BridgeSink>,
    /// Upper bound for each dial.
    pub timeout: Duration,
}

impl<D: Dialer> ProbeContext<D> {
    /// Creates a context.
    pub fn new(dialer: Arc<D>, sink: Arc<BridgeSink>, timeout: Duration) -> Self {
        Self {
            dialer,
            sink,
            timeout,
        }
    }
}

/// What one batch produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Indices into the batch of relays that gained a reachable address,
    /// ascending.
    pub accepted: Vec<usize>,
    /// Outcome counters.
    pub stats: BatchStats,
}

struct ProbeReport {
    relay: usize,
    address: usize,
    outcome: ProbeOutcome,
}

/// Dials `address` once, bounded by `timeout`.
pub async fn probe_address<D: Dialer>(dialer: &D, address: &str, timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(timeout, dialer.dial(address)).await {
        Ok(Ok(())) => ProbeOutcome::Reachable,
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => ProbeOutcome::Refused,
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => ProbeOutcome::TimedOut,
        Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
        Err(_) => ProbeOutcome::TimedOut,
    }
}

/// Probes every address of every relay in `batch` concurrently.
///
/// Returns once all dials have finished. Reachable addresses are appended
/// to each relay's `reachable_addresses` in address order, and written to
/// the sink as they are found.
pub async fn probe_batch<D: Dialer>(
    batch: &mut [RelayCandidate],
    ctx: &ProbeContext<D>,
) -> BatchResult {
    let mut tasks = JoinSet::new();

    for (relay_idx, relay) in batch.iter().enumerate() {
        for (addr_idx, address) in relay.addresses.iter().enumerate() {
            let dialer = Arc::clone(&ctx.dialer);
            let sink = Arc::clone(&ctx.sink);
            let address = address.clone();
            let fingerprint = relay.fingerprint.clone();
            let timeout = ctx.timeout;

            tasks.spawn(async move {
                let outcome = probe_address(dialer.as_ref(), &address, timeout).await;
                match outcome {
                    ProbeOutcome::Reachable => {
                        if let Err(e) = sink.append(&address, &fingerprint).await {
                            plog_fmt!(
                                LogLevel::Warn,
                                "Failed to record {} in {}: {}",
                                address,
                                sink.path().display(),
                                e,
                            );
                        }
                    }
                    ProbeOutcome::Refused => {
                        plog_fmt!(
                            LogLevel::Debug,
                            "Failed to connect to {}: connection refused",
                            address,
                        );
                    }
                    ProbeOutcome::TimedOut => {
                        plog_fmt!(LogLevel::Debug, "Failed to connect to {}: timed out", address);
                    }
                    ProbeOutcome::Failed(ref reason) => {
                        plog_fmt!(LogLevel::Debug, "Failed to connect to {}: {}", address, reason);
                    }
                }
                ProbeReport {
                    relay: relay_idx,
                    address: addr_idx,
                    outcome,
                }
            });
        }
    }

    let mut stats = BatchStats::default();
    let mut hits: Vec<(usize, usize)> = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => {
                stats.record(&report.outcome);
                if report.outcome.is_reachable() {
                    hits.push((report.relay, report.address));
                }
            }
            Err(e) => {
                stats.record(&ProbeOutcome::Failed(e.to_string()));
                plog_fmt!(LogLevel::Warn, "Probe task failed: {}", e);
            }
        }
    }

    hits.sort_unstable();

    let mut accepted: Vec<usize> = Vec::new();
    for (relay_idx, addr_idx) in hits {
        let relay = &mut batch[relay_idx];
        let address = relay.addresses[addr_idx].clone();
        relay.reachable_addresses.push(address);
        if accepted.last() != Some(&relay_idx) {
            accepted.push(relay_idx);
        }
    }

    BatchResult { accepted, stats }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedDialer;
    use super::*;
    use tokio::net::TcpListener;

    fn relay(fp: &str, addrs: &[&str]) -> RelayCandidate {
        RelayCandidate::new(fp, "", addrs.iter().map(|a| a.to_string()).collect())
    }

    async fn context<D: Dialer>(
        dialer: Arc<D>,
        dir: &tempfile::TempDir,
        timeout: Duration,
    ) -> ProbeContext<D> {
        let sink = BridgeSink::open(dir.path().join("_bridges.txt")).await.unwrap();
        ProbeContext::new(dialer, Arc::new(sink), timeout)
    }

    fn sink_lines(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_to_string(dir.path().join("_bridges.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_every_address_is_dialed() {
        let dir = tempfile::tempdir().unwrap();
        let dialer = Arc::new(ScriptedDialer::reaching(["1.1.1.1:443"]));
        let ctx = context(Arc::clone(&dialer), &dir, Duration::from_secs(1)).await;

        let mut batch = vec![
            relay("AAAA", &["1.1.1.1:443", "1.1.1.1:9001"]),
            relay("BBBB", &["2.2.2.2:443"]),
            relay("CCCC", &[]),
        ];
        let result = probe_batch(&mut batch, &ctx).await;

        assert_eq!(dialer.calls(), 3);
        assert_eq!(result.accepted, vec![0]);
        assert_eq!(result.stats.attempted, 3);
        assert_eq!(result.stats.reachable, 1);
        assert_eq!(result.stats.refused, 2);
        assert_eq!(batch[0].reachable_addresses, vec!["1.1.1.1:443"]);
        assert!(batch[1].reachable_addresses.is_empty());
        assert!(batch[2].reachable_addresses.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_addresses_of_one_relay() {
        let dir = tempfile::tempdir().unwrap();
        let dialer = Arc::new(ScriptedDialer::reaching(["1.1.1.1:443", "[2001:db8::1]:443"]));
        let ctx = context(dialer, &dir, Duration::from_secs(1)).await;

        let mut batch = vec![relay("AAAA", &["1.1.1.1:443", "[2001:db8::1]:443"])];
        let result = probe_batch(&mut batch, &ctx).await;

        assert_eq!(result.accepted, vec![0]);
        assert_eq!(
            batch[0].reachable_addresses,
            vec!["1.1.1.1:443", "[2001:db8::1]:443"]
        );
        assert_eq!(sink_lines(&dir).len(), 2);
    }

    #[tokio::test]
    async fn test_fold_follows_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut dialer = ScriptedDialer::reaching(["a:1", "a:2", "b:1", "c:1"]);
        dialer.delays.insert("a:1".into(), Duration::from_millis(120));
        dialer.delays.insert("a:2".into(), Duration::from_millis(80));
        dialer.delays.insert("b:1".into(), Duration::from_millis(40));
        let ctx = context(Arc::new(dialer), &dir, Duration::from_secs(2)).await;

        let mut batch = vec![
            relay("AAAA", &["a:1", "a:2"]),
            relay("BBBB", &["b:1"]),
            relay("CCCC", &["c:1"]),
        ];
        let result = probe_batch(&mut batch, &ctx).await;

        assert_eq!(result.accepted, vec![0, 1, 2]);
        assert_eq!(batch[0].reachable_addresses, vec!["a:1", "a:2"]);

        // Sink order follows completion, not input.
        let lines = sink_lines(&dir);
        assert_eq!(lines.first().map(String::as_str), Some("c:1 CCCC"));
        assert_eq!(lines.last().map(String::as_str), Some("a:1 AAAA"));
    }

    #[tokio::test]
    async fn test_slow_dial_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut dialer = ScriptedDialer::reaching(["slow:443", "fast:443"]);
        dialer.delays.insert("slow:443".into(), Duration::from_secs(30));
        let ctx = context(Arc::new(dialer), &dir, Duration::from_millis(50)).await;

        let mut batch = vec![relay("AAAA", &["slow:443"]), relay("BBBB", &["fast:443"])];
        let result = probe_batch(&mut batch, &ctx).await;

        assert_eq!(result.accepted, vec![1]);
        assert_eq!(result.stats.timed_out, 1);
        assert_eq!(sink_lines(&dir), vec!["fast:443 BBBB"]);
    }

    #[tokio::test]
    async fn test_sink_has_one_line_per_success() {
        let dir = tempfile::tempdir().unwrap();
        let reachable: Vec<String> = (0..12).map(|i| format!("10.0.0.{}:443", i)).collect();
        let dialer = Arc::new(ScriptedDialer::reaching(reachable.clone()));
        let ctx = context(dialer, &dir, Duration::from_secs(1)).await;

        let mut batch: Vec<RelayCandidate> = (0..20)
            .map(|i| {
                RelayCandidate::new(
                    format!("{:0>40X}", i),
                    "",
                    vec![format!("10.0.0.{}:443", i), format!("10.0.1.{}:443", i)],
                )
            })
            .collect();
        let result = probe_batch(&mut batch, &ctx).await;

        assert_eq!(result.stats.attempted, 40);
        assert_eq!(result.stats.reachable, 12);
        let lines = sink_lines(&dir);
        assert_eq!(lines.len(), 12);
        for line in &lines {
            let (addr, fp) = line.split_once(' ').unwrap();
            let i: usize = addr
                .trim_start_matches("10.0.0.")
                .trim_end_matches(":443")
                .parse()
                .unwrap();
            assert_eq!(fp, format!("{:0>40X}", i));
        }
    }

    #[tokio::test]
    async fn test_two_runs_append_in_blocks() {
        let dir = tempfile::tempdir().unwrap();

        let first = Arc::new(ScriptedDialer::reaching(["1.1.1.1:443", "1.1.1.2:443"]));
        let ctx = context(first, &dir, Duration::from_secs(1)).await;
        let mut batch = vec![
            relay("AAAA", &["1.1.1.1:443"]),
            relay("BBBB", &["1.1.1.2:443"]),
        ];
        probe_batch(&mut batch, &ctx).await;
        drop(ctx);

        let second = Arc::new(ScriptedDialer::reaching(["2.2.2.1:443", "2.2.2.2:443"]));
        let ctx = context(second, &dir, Duration::from_secs(1)).await;
        let mut batch = vec![
            relay("CCCC", &["2.2.2.1:443"]),
            relay("DDDD", &["2.2.2.2:443"]),
        ];
        probe_batch(&mut batch, &ctx).await;

        let lines = sink_lines(&dir);
        assert_eq!(lines.len(), 4);
        let mut first_block = lines[..2].to_vec();
        let mut second_block = lines[2..].to_vec();
        first_block.sort();
        second_block.sort();
        assert_eq!(first_block, vec!["1.1.1.1:443 AAAA", "1.1.1.2:443 BBBB"]);
        assert_eq!(second_block, vec!["2.2.2.1:443 CCCC", "2.2.2.2:443 DDDD"]);
    }

    #[tokio::test]
    async fn test_tcp_dialer_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let outcome = probe_address(&TcpDialer, &addr, Duration::from_secs(2)).await;
        assert_eq!(outcome, ProbeOutcome::Reachable);
    }

    #[tokio::test]
    async fn test_tcp_dialer_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let outcome = probe_address(&TcpDialer, &addr, Duration::from_secs(2)).await;
        assert!(!outcome.is_reachable());
    }

    #[test]
    fn test_stats_merge() {
        let mut a = BatchStats::default();
        a.record(&ProbeOutcome::Reachable);
        a.record(&ProbeOutcome::TimedOut);
        let mut b = BatchStats::default();
        b.record(&ProbeOutcome::Failed("unreachable".into()));
        a.merge(&b);
        assert_eq!(a.attempted, 3);
        assert_eq!(a.reachable, 1);
        assert_eq!(a.timed_out, 1);
        assert_eq!(a.failed, 1);
    }
}
