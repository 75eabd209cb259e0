//! Relay candidates and address handling.
//!
//! A [`RelayCandidate`] is one relay entry from the public relay directory,
//! carrying the addresses that will be probed and, after probing, the subset
//! that turned out to be reachable.
//!
//! # Address Forms
//!
//! Directory addresses are `host:port` strings where the host is one of:
//!
//! | Form | Example |
//! |------|---------|
//! | IPv4 | `192.0.2.10:9001` |
//! | IPv6 (bracketed) | `[2001:db8::1]:443` |
//! | Hostname | `relay.example.org:443` |
//!
//! [`parse_address`] splits these into host and port.

use serde::{Deserialize, Serialize};

/// A relay from the directory, before and after probing.
///
/// `reachable_addresses` is never read from the directory; it is filled by
/// the prober and only ever appended to.
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::RelayCandidate;
///
/// let relay = RelayCandidate::new(
///     "AABBCCDD00112233445566778899AABBCCDDEEFF",
///     "de",
///     vec!["192.0.2.10:9001".to_string()],
/// );
/// assert!(relay.reachable_addresses.is_empty());
/// assert!(!relay.is_reachable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCandidate {
    /// Relay identity fingerprint.
    pub fingerprint: String,
    /// Two-letter country code, empty when unknown.
    #[serde(default)]
    pub country: String,
    /// OR addresses in directory order.
    #[serde(rename = "or_addresses", default)]
    pub addresses: Vec<String>,
    /// Addresses confirmed reachable during this run.
    #[serde(skip)]
    pub reachable_addresses: Vec<String>,
}

impl RelayCandidate {
    /// Creates a candidate that has not been probed yet.
    pub fn new(
        fingerprint: impl Into<String>,
        country: impl Into<String>,
        addresses: Vec<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            country: country.into(),
            addresses,
            reachable_addresses: Vec::new(),
        }
    }

    /// Returns true once at least one address has been confirmed reachable.
    pub fn is_reachable(&self) -> bool {
        !self.reachable_addresses.is_empty()
    }

    /// Bridge line for one of this relay's addresses: `"<address> <fingerprint>"`.
    pub fn bridge_line(&self, address: &str) -> String {
        format!("{} {}", address, self.fingerprint)
    }

    /// Iterates over the bridge lines of all reachable addresses, in order.
    pub fn bridge_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.reachable_addresses
            .iter()
            .map(move |addr| self.bridge_line(addr))
    }
}

/// Onionoo `details` response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryDocument {
    /// Relay records.
    #[serde(default)]
    pub relays: Vec<RelayCandidate>,
}

/// Splits an address into host and port.
///
/// A bracketed IPv6 literal is split on the last colon after the closing
/// bracket and returned without brackets. Any other address is split on
/// the first colon.
///
/// Returns `None` when the address has no port separator, including a
/// bracketed literal without `]:`.
///
/// # Example
///
/// ```rust
/// use tor_relay_scanner::relay::parse_address;
///
/// assert_eq!(parse_address("1.2.3.4:443"), Some(("1.2.3.4", "443")));
/// assert_eq!(parse_address("[2001:db8::1]:443"), Some(("2001:db8::1", "443")));
/// assert_eq!(parse_address("no-port"), None);
/// ```
pub fn parse_address(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let close = rest.rfind("]:")?;
        return Some((&rest[..close], &rest[close + 2..]));
    }
    addr.split_once(':')
}

/// Returns the port part of an address, if any.
pub fn address_port(addr: &str) -> Option<&str> {
    parse_address(addr).map(|(_, port)| port)
}

/// Returns true for a 40-character hexadecimal relay fingerprint.
///
/// Directory records failing this check are dropped on decode.
///
/// ```rust
/// use tor_relay_scanner::relay::is_valid_fingerprint;
///
/// assert!(is_valid_fingerprint("AABBCCDD00112233445566778899AABBCCDDEEFF"));
/// assert!(!is_valid_fingerprint("AABBCCDD"));
/// ```
pub fn is_valid_fingerprint(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}
