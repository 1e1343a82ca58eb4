// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! TTL policy: turning a nominal TTL into the effective TTL a wrapper uses.

use std::time::Duration;

/// Divisor for the fuzzy-TTL jitter window: the effective TTL deviates from
/// the nominal TTL by at most `nominal / TTL_SPREAD` in either direction.
pub const TTL_SPREAD: u64 = 10;

/// Computes the effective TTL for a wrapper from its nominal TTL.
///
/// With `fuzzy` disabled the nominal TTL is returned unchanged. With `fuzzy`
/// enabled a uniformly random whole-second TTL is drawn from
/// `[nominal - nominal/10, nominal + nominal/10]`, so that wrappers built at
/// the same moment do not all expire their entries in the same instant.
///
/// The builders call this once per decoration: every call through one wrapper
/// shares a single effective TTL (absent a per-call override).
///
/// # Examples
///
/// ```
/// use recall::ttl::effective_ttl;
/// use std::time::Duration;
///
/// assert_eq!(effective_ttl(Duration::from_secs(600), false), Duration::from_secs(600));
///
/// let fuzzed = effective_ttl(Duration::from_secs(600), true);
/// assert!(fuzzed >= Duration::from_secs(540) && fuzzed <= Duration::from_secs(660));
/// ```
#[must_use]
pub fn effective_ttl(nominal: Duration, fuzzy: bool) -> Duration {
    if !fuzzy {
        return nominal;
    }
    let secs = nominal.as_secs();
    let spread = secs / TTL_SPREAD;
    Duration::from_secs(fastrand::u64(secs.saturating_sub(spread)..=secs.saturating_add(spread)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_without_fuzz() {
        assert_eq!(effective_ttl(Duration::from_secs(10), false), Duration::from_secs(10));
    }

    #[test]
    fn fuzzy_stays_within_the_spread_window() {
        for _ in 0..200 {
            let ttl = effective_ttl(Duration::from_secs(10), true).as_secs();
            assert!((9..=11).contains(&ttl), "ttl {ttl} outside [9, 11]");
        }
    }

    #[test]
    fn fuzzy_zero_is_zero() {
        assert_eq!(effective_ttl(Duration::ZERO, true), Duration::ZERO);
    }

    #[test]
    fn short_ttls_do_not_underflow() {
        for _ in 0..50 {
            // A spread of 9 / 10 == 0 seconds leaves the TTL untouched.
            assert_eq!(effective_ttl(Duration::from_secs(9), true), Duration::from_secs(9));
        }
    }
}
