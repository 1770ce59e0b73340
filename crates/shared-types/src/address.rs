//! # Station Addresses
//!
//! A station address is an opaque, case-insensitive string. Three forms
//! appear on the wire:
//!
//! - a bare callsign: `G8PZT`
//! - a callsign with a numeric SSID suffix: `G8PZT-1` (another session or
//!   service at the same physical station)
//! - compound circuit-endpoint forms: `USER@STATION:PORT` or `STATION:ID`
//!
//! Identity comparisons are always case-insensitive. The *base identifier*
//! is the portion before a trailing `-N` suffix; a `-` followed by anything
//! non-numeric is part of the base itself.

/// Base identifier of an address: the portion before a trailing numeric
/// `-N` suffix.
///
/// # Example
///
/// ```
/// use shared_types::address::base;
///
/// assert_eq!(base("G8PZT-1"), "G8PZT");
/// assert_eq!(base("G8PZT"), "G8PZT");
/// assert_eq!(base("M2ABC"), "M2ABC");
/// assert_eq!(base("KIDDER-BBS"), "KIDDER-BBS");
/// ```
#[must_use]
pub fn base(addr: &str) -> &str {
    match addr.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => addr,
    }
}

/// Numeric SSID suffix of an address, if present.
///
/// Returns `None` for bare callsigns and for suffixes that are not plain
/// decimal integers. Suffixes too large for `u16` are also treated as absent
/// rather than wrapped.
#[must_use]
pub fn ssid(addr: &str) -> Option<u16> {
    match addr.rsplit_once('-') {
        Some((_, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
            tail.parse().ok()
        }
        _ => None,
    }
}

/// Case-insensitive address equality.
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
