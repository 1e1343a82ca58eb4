// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring an in-memory store.

use recall_store::Clock;

use crate::InMemoryStore;

/// Builder for [`InMemoryStore`].
///
/// # Examples
///
/// ```
/// use recall_memory::InMemoryStore;
/// use recall_store::Clock;
///
/// let store = InMemoryStore::builder()
///     .clock(Clock::system())
///     .max_capacity(10_000)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    pub(crate) clock: Clock,
    pub(crate) max_capacity: Option<u64>,
}

impl InMemoryStoreBuilder {
    /// Creates a builder with a system clock and unbounded capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clock used for TTL expiry checks.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the maximum number of entries held before eviction kicks in.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> InMemoryStore {
        InMemoryStore::from_builder(&self)
    }
}
