// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory store implementation using moka.

use std::time::Duration;

use moka::future::Cache;
use recall_store::{CacheStore, Clock, Error};

use crate::builder::InMemoryStoreBuilder;

/// A stored payload together with its absolute expiry (unix seconds).
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub(crate) value: Vec<u8>,
    pub(crate) expires_at: u64,
}

/// An in-memory cache store backed by moka.
///
/// Capacity-based eviction is delegated to moka (`TinyLFU`). TTL expiry is
/// checked against the store's [`Clock`] on every read: an entry past its
/// deadline reads back as absent and is dropped. Using the clock rather than
/// moka's internal timer keeps expiry testable with a frozen clock.
///
/// Cloning is cheap and clones share the underlying cache.
///
/// # Examples
///
/// ```
/// use recall_memory::InMemoryStore;
/// use recall_store::{CacheStore, Clock};
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::frozen(100);
/// let store = InMemoryStore::new(clock.clone());
///
/// store.set("key", b"v".to_vec(), Duration::from_secs(5)).await?;
/// assert!(store.get("key").await?.is_some());
///
/// clock.advance(6);
/// assert!(store.get("key").await?.is_none());
/// # Ok::<(), recall_store::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Cache<String, StoredEntry>,
    clock: Clock,
}

impl InMemoryStore {
    /// Creates a new unbounded in-memory store.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::builder().clock(clock).build()
    }

    /// Creates a new in-memory store with a maximum entry capacity.
    ///
    /// Once the capacity is reached, entries are evicted using moka's
    /// `TinyLFU` policy.
    #[must_use]
    pub fn with_capacity(clock: Clock, max_capacity: u64) -> Self {
        Self::builder().clock(clock).max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory store.
    #[must_use]
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::new()
    }

    pub(crate) fn from_builder(builder: &InMemoryStoreBuilder) -> Self {
        let mut moka_builder = Cache::builder();

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        Self {
            inner: moka_builder.build(),
            clock: builder.clock.clone(),
        }
    }

    /// Returns the number of entries currently held, including entries whose
    /// TTL has elapsed but which have not been dropped yet.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        match self.inner.get(key).await {
            Some(entry) if entry.expires_at >= self.clock.now() => Ok(Some(entry.value)),
            Some(_) => {
                // Lazily drop entries the clock has outrun.
                self.inner.invalidate(key).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Error> {
        let entry = StoredEntry {
            value,
            expires_at: self.clock.now().saturating_add(ttl.as_secs()),
        };
        self.inner.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}
