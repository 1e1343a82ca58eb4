// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache store backends.
//!
//! [`CacheStore`] defines the interface that all cache backends must implement.
//! This trait is designed for composition: implement the storage operations,
//! then use `recall` to layer key derivation, serialization, and multi-tier
//! behavior on top.

use std::time::Duration;

use crate::Error;

/// Trait for cache store implementations.
///
/// A store holds opaque byte payloads under string keys. Every write carries a
/// time-to-live; entries whose TTL has elapsed must read back as absent. How
/// (and when) expired entries are evicted is entirely the store's concern.
///
/// The three unary methods are required. The batched methods default to looping
/// over the unary ones; stores with native batch operations should override them.
/// Batched reads are positional: `mget` returns one slot per requested key, in
/// the same order.
pub trait CacheStore: Send + Sync {
    /// Gets the payload stored under `key`, or `None` on a miss.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send;

    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes the entry stored under `key`, if any.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Gets payloads for all `keys`, one slot per key in the same order.
    fn mget(&self, keys: &[String]) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>, Error>> + Send {
        async move {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(self.get(key).await?);
            }
            Ok(values)
        }
    }

    /// Stores every `(key, value)` pair with the same `ttl`.
    fn mset(&self, pairs: Vec<(String, Vec<u8>)>, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            for (key, value) in pairs {
                self.set(&key, value, ttl).await?;
            }
            Ok(())
        }
    }

    /// Removes the entries stored under all `keys`.
    fn mdelete(&self, keys: &[String]) -> impl Future<Output = Result<(), Error>> + Send {
        async move {
            for key in keys {
                self.delete(key).await?;
            }
            Ok(())
        }
    }
}

impl<S: CacheStore> CacheStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, Error>> + Send {
        S::get(self, key)
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send {
        S::set(self, key, value, ttl)
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), Error>> + Send {
        S::delete(self, key)
    }

    fn mget(&self, keys: &[String]) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>, Error>> + Send {
        S::mget(self, keys)
    }

    fn mset(&self, pairs: Vec<(String, Vec<u8>)>, ttl: Duration) -> impl Future<Output = Result<(), Error>> + Send {
        S::mset(self, pairs, ttl)
    }

    fn mdelete(&self, keys: &[String]) -> impl Future<Output = Result<(), Error>> + Send {
        S::mdelete(self, keys)
    }
}
