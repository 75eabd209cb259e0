//! Relay directory download.
//!
//! Relay data comes from Onionoo `details` documents. Sources are tried once
//! each, in order, and the first one that downloads and decodes wins.
//!
//! ```text
//!   user --url values ──┐
//!                       ▼
//!   ┌───────────────────────────────────────────────┐
//!   │ onionoo.torproject.org                        │
//!   │ CORS proxy of onionoo                         │──▶ first success
//!   │ GitHub mirror                                 │
//!   │ Bitbucket mirror                              │
//!   └───────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use reqwest::{Client, Proxy};

use crate::config::LogLevel;
use crate::error::{Error, Result};
use crate::plog_fmt;
use crate::relay::{is_valid_fingerprint, DirectoryDocument, RelayCandidate};

/// Built-in directory sources, in priority order.
pub const DEFAULT_DIRECTORY_URLS: [&str; 4] = [
    "https://onionoo.torproject.org/details?type=relay&running=true&fields=fingerprint,or_addresses,country",
    "https://icors.vercel.app/?https://onionoo.torproject.org/details?type=relay&running=true&fields=fingerprint,or_addresses,country",
    "https://github.com/ValdikSS/tor-onionoo-mirror/raw/master/details-running-relays-fingerprint-address-only.json",
    "https://bitbucket.org/ValdikSS/tor-onionoo-mirror/raw/master/details-running-relays-fingerprint-address-only.json",
];

/// Source list with user-supplied URLs ahead of the built-in ones.
///
/// ```rust
/// use tor_relay_scanner::directory::{directory_urls, DEFAULT_DIRECTORY_URLS};
///
/// let urls = directory_urls(&["https://mirror.example/relays.json".to_string()]);
/// assert_eq!(urls[0], "https://mirror.example/relays.json");
/// assert_eq!(urls.len(), DEFAULT_DIRECTORY_URLS.len() + 1);
/// ```
pub fn directory_urls(extra: &[String]) -> Vec<String> {
    extra
        .iter()
        .cloned()
        .chain(DEFAULT_DIRECTORY_URLS.iter().map(|u| u.to_string()))
        .collect()
}

/// Decodes an Onionoo document.
///
/// Records without a well-formed fingerprint are dropped.
///
/// # Errors
///
/// Returns [`Error::Directory`] if the body is not a valid document.
pub fn parse_directory(body: &str) -> Result<Vec<RelayCandidate>> {
    let document: DirectoryDocument = serde_json::from_str(body)?;
    Ok(document
        .relays
        .into_iter()
        .filter(|r| is_valid_fingerprint(&r.fingerprint))
        .collect())
}

/// Builds the HTTP client used for directory downloads.
///
/// # Errors
///
/// Returns [`Error::Config`] if the proxy URL is invalid or the client
/// cannot be built.
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(proxy) = proxy {
        let proxy = Proxy::all(proxy)
            .map_err(|e| Error::Config(format!("invalid proxy URL {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
}

/// Downloads relay data, trying each URL once in order.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid proxy, and [`Error::Fetch`] when
/// no source produced a usable document.
pub async fn fetch_relays(
    urls: &[String],
    timeout: Duration,
    proxy: Option<&str>,
) -> Result<Vec<RelayCandidate>> {
    let client = build_client(timeout, proxy)?;

    for url in urls {
        match fetch_one(&client, url).await {
            Ok(relays) => {
                plog_fmt!(
                    LogLevel::Info,
                    "Successfully loaded {} relays from {}",
                    relays.len(),
                    url,
                );
                return Ok(relays);
            }
            Err(e) => {
                plog_fmt!(LogLevel::Warn, "Can't download Tor Relay data from {}: {}", url, e);
            }
        }
    }

    Err(Error::Fetch(format!("all {} sources failed", urls.len())))
}

async fn fetch_one(client: &Client, url: &str) -> Result<Vec<RelayCandidate>> {
    let body = client
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| Error::Fetch(e.to_string()))?
        .text()
        .await
        .map_err(|e| Error::Fetch(e.to_string()))?;
    parse_directory(&body)
}
