//! Append-only bridge sink.
//!
//! Every reachable address is written here the moment its dial succeeds, so
//! bridges found before a crash or kill are never lost. The file is opened
//! in append mode for the whole run and never truncated.
//!
//! Line format:
//!
//! ```text
//! <address> <fingerprint>\n
//! ```
//!
//! All probing tasks share one [`BridgeSink`]; a mutex around the file
//! serializes writers so lines never interleave. No ordering between
//! addresses is implied.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Shared append-only file of reachable addresses.
#[derive(Debug)]
pub struct BridgeSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl BridgeSink {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Appends `"<address> <fingerprint>\n"` and flushes it to the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the write fails.
    pub async fn append(&self, address: &str, fingerprint: &str) -> Result<()> {
        let line = format!("{} {}\n", address, fingerprint);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Path of the sink file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_bridges.txt");

        let sink = BridgeSink::open(&path).await.unwrap();
        sink.append("1.2.3.4:443", "ABCD").await.unwrap();
        sink.append("[::1]:9001", "EF01").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1.2.3.4:443 ABCD\n[::1]:9001 EF01\n");
        assert_eq!(sink.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_reopen_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_bridges.txt");

        {
            let sink = BridgeSink::open(&path).await.unwrap();
            sink.append("1.1.1.1:443", "AAAA").await.unwrap();
        }
        {
            let sink = BridgeSink::open(&path).await.unwrap();
            sink.append("2.2.2.2:443", "BBBB").await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1.1.1.1:443 AAAA\n2.2.2.2:443 BBBB\n");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_bridges.txt");
        let sink = Arc::new(BridgeSink::open(&path).await.unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..50 {
            let sink = Arc::clone(&sink);
            tasks.spawn(async move {
                let address = format!("10.0.0.{}:443", i);
                let fingerprint = format!("{:0>40X}", i);
                sink.append(&address, &fingerprint).await.unwrap();
            });
        }
        while tasks.join_next().await.is_some() {}

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 50);
        for line in lines {
            let (addr, fp) = line.split_once(' ').unwrap();
            assert!(addr.starts_with("10.0.0."));
            assert_eq!(fp.len(), 40);
        }
    }
}
