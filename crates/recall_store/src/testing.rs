// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides [`MockStore`], a configurable in-memory store that
//! records all operations and supports failure injection for testing error paths.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{CacheStore, Error};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A get operation was performed with the given key.
    Get(String),
    /// A set operation was performed with the given key, payload, and TTL.
    Set {
        /// The key that was written.
        key: String,
        /// The payload bytes that were written.
        value: Vec<u8>,
        /// The TTL the entry was written with.
        ttl: Duration,
    },
    /// A delete operation was performed with the given key.
    Delete(String),
    /// A batched get was performed with the given keys.
    MGet(Vec<String>),
    /// A batched set was performed with the given pairs and TTL.
    MSet {
        /// The key/payload pairs that were written.
        pairs: Vec<(String, Vec<u8>)>,
        /// The TTL every pair was written with.
        ttl: Duration,
    },
    /// A batched delete was performed with the given keys.
    MDelete(Vec<String>),
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// This store keeps values in memory together with the TTL they were written
/// with, records all operations for later verification, and can be configured
/// to fail operations on demand. Entries never expire by themselves; tests
/// simulate eviction with explicit deletes so that time stays fully under the
/// test's control.
///
/// Cloning is cheap and clones share state.
///
/// # Examples
///
/// ```
/// use recall_store::{CacheStore, testing::{MockStore, StoreOp}};
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let store = MockStore::new();
/// store.set("user:1", b"payload".to_vec(), Duration::from_secs(5)).await?;
///
/// assert_eq!(store.entry("user:1"), Some((b"payload".to_vec(), Duration::from_secs(5))));
/// assert_eq!(store.operations().len(), 1);
/// # Ok::<(), recall_store::Error>(())
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, (Vec<u8>, Duration)>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockStore {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored payload and TTL for `key`, if present.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<(Vec<u8>, Duration)> {
        self.data.lock().get(key).cloned()
    }

    /// Returns the number of entries in the store.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the store contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Removes `key` directly, without recording an operation.
    ///
    /// Used by tests to simulate TTL eviction of a near-cache entry.
    pub fn evict(&self, key: &str) {
        self.data.lock().remove(key);
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should fail.
    ///
    /// # Examples
    ///
    /// ```
    /// use recall_store::testing::{MockStore, StoreOp};
    ///
    /// let store = MockStore::new();
    ///
    /// // Fail all gets
    /// store.fail_when(|op| matches!(op, StoreOp::Get(_)));
    ///
    /// // Fail gets for a specific key
    /// store.fail_when(|op| matches!(op, StoreOp::Get(k) if k == "bad_key"));
    /// ```
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &StoreOp) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn check(&self, op: StoreOp, what: &str) -> Result<(), Error> {
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::from_message(format!("mock: {what} failed")));
        }
        self.record(op);
        Ok(())
    }
}

impl CacheStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.check(StoreOp::Get(key.to_owned()), "get")?;
        Ok(self.data.lock().get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), Error> {
        self.check(
            StoreOp::Set {
                key: key.to_owned(),
                value: value.clone(),
                ttl,
            },
            "set",
        )?;
        self.data.lock().insert(key.to_owned(), (value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.check(StoreOp::Delete(key.to_owned()), "delete")?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, Error> {
        self.check(StoreOp::MGet(keys.to_vec()), "mget")?;
        let data = self.data.lock();
        Ok(keys.iter().map(|key| data.get(key).map(|(value, _)| value.clone())).collect())
    }

    async fn mset(&self, pairs: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<(), Error> {
        self.check(StoreOp::MSet { pairs: pairs.clone(), ttl }, "mset")?;
        let mut data = self.data.lock();
        for (key, value) in pairs {
            data.insert(key, (value, ttl));
        }
        Ok(())
    }

    async fn mdelete(&self, keys: &[String]) -> Result<(), Error> {
        self.check(StoreOp::MDelete(keys.to_vec()), "mdelete")?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn records_operations_in_order() {
        block_on(async {
            let store = MockStore::new();
            store.set("a", b"1".to_vec(), Duration::from_secs(10)).await.unwrap();
            let _ = store.get("a").await.unwrap();
            store.delete("a").await.unwrap();

            assert_eq!(
                store.operations(),
                vec![
                    StoreOp::Set {
                        key: "a".to_owned(),
                        value: b"1".to_vec(),
                        ttl: Duration::from_secs(10),
                    },
                    StoreOp::Get("a".to_owned()),
                    StoreOp::Delete("a".to_owned()),
                ]
            );
        });
    }

    #[test]
    fn failure_injection_is_scoped_by_predicate() {
        block_on(async {
            let store = MockStore::new();
            store.fail_when(|op| matches!(op, StoreOp::Get(k) if k == "forbidden"));

            assert!(store.get("forbidden").await.is_err());
            assert!(store.get("allowed").await.is_ok());

            store.clear_failures();
            assert!(store.get("forbidden").await.is_ok());
        });
    }

    #[test]
    fn mget_is_positional() {
        block_on(async {
            let store = MockStore::new();
            store.set("b", b"2".to_vec(), Duration::from_secs(1)).await.unwrap();

            let keys = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
            let values = store.mget(&keys).await.unwrap();
            assert_eq!(values, vec![None, Some(b"2".to_vec()), None]);
        });
    }

    #[test]
    fn evict_bypasses_recording() {
        block_on(async {
            let store = MockStore::new();
            store.set("a", b"1".to_vec(), Duration::from_secs(1)).await.unwrap();
            store.evict("a");

            assert!(!store.contains_key("a"));
            assert_eq!(store.operations().len(), 1);
        });
    }
}
