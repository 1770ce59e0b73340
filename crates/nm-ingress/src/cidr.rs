//! # Address/CIDR Matching
//!
//! Pure prefix matching used by the blacklist gate and by source-filtering
//! collaborators. Each list entry is either a bare IP address (exact match)
//! or `address/len` CIDR notation, IPv4 or IPv6.
//!
//! Malformed entries are skipped with a debug log, never fatal: an operator
//! typo in one blacklist line must not take the whole admission policy down
//! with it. This includes out-of-range prefix lengths such as `/999`.

use std::net::IpAddr;

use tracing::debug;

/// A parsed network prefix. Bare addresses parse as full-length prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    V4 { net: u32, len: u8 },
    V6 { net: u128, len: u8 },
}

impl Prefix {
    /// Parse one list entry. Returns `None` for anything malformed.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let (addr_part, len_part) = match entry.split_once('/') {
            Some((a, l)) => (a, Some(l)),
            None => (entry, None),
        };

        let addr: IpAddr = addr_part.parse().ok()?;
        match addr {
            IpAddr::V4(v4) => {
                let len = match len_part {
                    Some(l) => l.parse::<u8>().ok().filter(|l| *l <= 32)?,
                    None => 32,
                };
                Some(Prefix::V4 {
                    net: u32::from(v4) & mask_v4(len),
                    len,
                })
            }
            IpAddr::V6(v6) => {
                let len = match len_part {
                    Some(l) => l.parse::<u8>().ok().filter(|l| *l <= 128)?,
                    None => 128,
                };
                Some(Prefix::V6 {
                    net: u128::from(v6) & mask_v6(len),
                    len,
                })
            }
        }
    }

    /// Whether `addr` falls inside this prefix. Family mismatch is simply
    /// a non-match.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self, addr) {
            (Prefix::V4 { net, len }, IpAddr::V4(v4)) => {
                u32::from(v4) & mask_v4(*len) == *net
            }
            (Prefix::V6 { net, len }, IpAddr::V6(v6)) => {
                u128::from(v6) & mask_v6(*len) == *net
            }
            _ => false,
        }
    }
}

fn mask_v4(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(len))
    }
}

fn mask_v6(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(len))
    }
}

/// A prefix list parsed once at configuration load.
#[derive(Debug, Clone, Default)]
pub struct PrefixList {
    prefixes: Vec<Prefix>,
}

impl PrefixList {
    /// Parse a list of entries, skipping (and logging) malformed ones.
    #[must_use]
    pub fn parse_lenient(entries: &[String]) -> Self {
        let mut prefixes = Vec::with_capacity(entries.len());
        for entry in entries {
            match Prefix::parse(entry) {
                Some(prefix) => prefixes.push(prefix),
                None => debug!(entry = %entry, "Skipping malformed prefix list entry"),
            }
        }
        Self { prefixes }
    }

    /// Whether `addr` matches any prefix in the list.
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.prefixes.iter().any(|p| p.contains(addr))
    }

    /// Number of entries that survived parsing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// One-shot convenience form: does `address` fall inside `prefixes`?
///
/// An unparsable input address always yields `false`.
#[must_use]
pub fn matches(address: &str, prefixes: &[String]) -> bool {
    let Ok(addr) = address.trim().parse::<IpAddr>() else {
        return false;
    };
    PrefixList::parse_lenient(prefixes).contains(addr)
}
