//! Country and port policy for relay candidates.
//!
//! # Country Rule Syntax
//!
//! The rule is a comma-separated token list. Each token is trimmed, then
//! classified by its prefix:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `!us` | Exclusive: only listed exclusive countries pass |
//! | `-ru` | Excluded: never passes |
//! | `de` | Preferred: survivors are sorted by the token's position |
//!
//! ```text
//!   "de, !nl, -ru, us"
//!    │    │     │    └── preference rank 3
//!    │    │     └─────── excluded
//!    │    └───────────── exclusive
//!    └────────────────── preference rank 0
//! ```
//!
//! Country codes are compared exactly as given against the directory's
//! country field.
//!
//! # Example
//!
//! ```rust
//! use tor_relay_scanner::RelayCandidate;
//! use tor_relay_scanner::policy::{filter_and_sort, CountryPolicy};
//!
//! let relays = vec![
//!     RelayCandidate::new("A", "ru", vec!["192.0.2.1:443".into()]),
//!     RelayCandidate::new("B", "us", vec!["192.0.2.2:443".into(), "192.0.2.2:9001".into()]),
//!     RelayCandidate::new("C", "de", vec!["192.0.2.3:443".into()]),
//! ];
//!
//! let policy = CountryPolicy::parse("de,-ru");
//! let survivors = filter_and_sort(relays, &policy, &["443".to_string()]);
//!
//! assert_eq!(survivors.len(), 2);
//! assert_eq!(survivors[0].fingerprint, "C");
//! assert_eq!(survivors[1].addresses, vec!["192.0.2.2:443".to_string()]);
//! ```

use std::collections::{HashMap, HashSet};

use crate::relay::{address_port, RelayCandidate};

/// Parsed country rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryPolicy {
    /// If non-empty, only these countries pass.
    pub exclusive_only: HashSet<String>,
    /// These countries never pass.
    pub excluded: HashSet<String>,
    /// Sort rank by country; unranked countries sort last.
    pub preference_order: HashMap<String, usize>,
}

impl CountryPolicy {
    /// Parses a comma-separated country rule.
    ///
    /// Preference ranks are the token's position in the whole list, so
    /// `!nl,de` gives `de` rank 1.
    pub fn parse(rule: &str) -> Self {
        let mut policy = Self::default();
        if rule.trim().is_empty() {
            return policy;
        }

        for (i, token) in rule.split(',').enumerate() {
            let token = token.trim();
            if let Some(cc) = token.strip_prefix('!') {
                if !cc.is_empty() {
                    policy.exclusive_only.insert(cc.to_string());
                }
            } else if let Some(cc) = token.strip_prefix('-') {
                if !cc.is_empty() {
                    policy.excluded.insert(cc.to_string());
                }
            } else if !token.is_empty() {
                policy.preference_order.insert(token.to_string(), i);
            }
        }
        policy
    }

    /// Returns true if a relay in `country` may be tested.
    pub fn allows(&self, country: &str) -> bool {
        if !self.exclusive_only.is_empty() && !self.exclusive_only.contains(country) {
            return false;
        }
        !self.excluded.contains(country)
    }

    /// Sort rank for `country`; `usize::MAX` when unranked.
    pub fn rank(&self, country: &str) -> usize {
        self.preference_order
            .get(country)
            .copied()
            .unwrap_or(usize::MAX)
    }
}

/// Applies the country policy and port allow-list, then sorts by preference.
///
/// Addresses are narrowed to `ports` when `ports` is non-empty, and relays
/// left without addresses are dropped. The sort is stable, so relays with
/// the same rank keep their incoming order.
pub fn filter_and_sort(
    candidates: Vec<RelayCandidate>,
    policy: &CountryPolicy,
    ports: &[String],
) -> Vec<RelayCandidate> {
    let mut filtered: Vec<RelayCandidate> = candidates
        .into_iter()
        .filter(|r| policy.allows(&r.country))
        .filter_map(|r| narrow_ports(r, ports))
        .collect();

    if !policy.preference_order.is_empty() {
        filtered.sort_by_key(|r| policy.rank(&r.country));
    }

    filtered
}

fn narrow_ports(mut relay: RelayCandidate, ports: &[String]) -> Option<RelayCandidate> {
    if ports.is_empty() {
        return Some(relay);
    }

    relay.addresses.retain(|addr| match address_port(addr) {
        Some(port) => ports.iter().any(|p| p.trim() == port),
        None => false,
    });

    if relay.addresses.is_empty() {
        None
    } else {
        Some(relay)
    }
}
