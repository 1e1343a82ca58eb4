// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wall-clock abstraction with a freezable variant for tests.
//!
//! The two-tier cache protocol embeds absolute unix timestamps (whole seconds)
//! into stored payloads, so the clock interface works in unix seconds. Wrappers
//! receive a [`Clock`] at construction; production code uses [`Clock::system`],
//! tests use [`Clock::frozen`] and drive time explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of unix timestamps, either the system clock or a frozen test clock.
///
/// Cloning a frozen clock shares the underlying time: advancing one handle is
/// observed by all clones.
///
/// # Examples
///
/// ```
/// use recall_store::Clock;
///
/// let clock = Clock::frozen(20);
/// assert_eq!(clock.now(), 20);
///
/// clock.advance(6);
/// assert_eq!(clock.now(), 26);
/// ```
#[derive(Clone, Debug)]
pub struct Clock {
    inner: Inner,
}

#[derive(Clone, Debug)]
enum Inner {
    System,
    Frozen(Arc<AtomicU64>),
}

impl Clock {
    /// Creates a clock that reads the system time.
    #[must_use]
    pub fn system() -> Self {
        Self { inner: Inner::System }
    }

    /// Creates a frozen clock starting at `now` unix seconds.
    ///
    /// The clock only moves when [`advance`](Self::advance) or
    /// [`set`](Self::set) is called.
    #[must_use]
    pub fn frozen(now: u64) -> Self {
        Self {
            inner: Inner::Frozen(Arc::new(AtomicU64::new(now))),
        }
    }

    /// Returns the current time as unix seconds.
    #[must_use]
    pub fn now(&self) -> u64 {
        match &self.inner {
            Inner::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default(),
            Inner::Frozen(now) => now.load(Ordering::Relaxed),
        }
    }

    /// Moves a frozen clock forward by `secs`.
    ///
    /// # Panics
    ///
    /// Panics when called on a system clock.
    #[expect(clippy::panic, reason = "advancing a system clock is a programming error")]
    pub fn advance(&self, secs: u64) {
        match &self.inner {
            Inner::System => panic!("cannot advance a system clock"),
            Inner::Frozen(now) => {
                now.fetch_add(secs, Ordering::Relaxed);
            }
        }
    }

    /// Sets a frozen clock to an absolute unix timestamp.
    ///
    /// # Panics
    ///
    /// Panics when called on a system clock.
    #[expect(clippy::panic, reason = "setting a system clock is a programming error")]
    pub fn set(&self, now: u64) {
        match &self.inner {
            Inner::System => panic!("cannot set a system clock"),
            Inner::Frozen(time) => time.store(now, Ordering::Relaxed),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
