// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Core store abstractions for the `recall` function-result cache.
//!
//! This crate defines the [`CacheStore`] trait that all cache backends must satisfy,
//! along with the opaque [`Error`] type for fallible store operations and a [`Clock`]
//! that can be frozen for deterministic time-based tests.
//!
//! # Overview
//!
//! The store abstraction separates raw byte storage from caching semantics. A store
//! holds opaque byte payloads under string keys with a per-entry time-to-live; the
//! `recall` crate layers key derivation, serialization, TTL policy, and the two-tier
//! refresh protocol on top.
//!
//! # Implementing a Cache Store
//!
//! Implement the three unary methods; the batched methods have default
//! implementations that loop, which backends with native batching should override:
//!
//! ```
//! use recall_store::{CacheStore, Error};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! #[derive(Debug, Default)]
//! struct SimpleStore(RwLock<HashMap<String, Vec<u8>>>);
//!
//! impl CacheStore for SimpleStore {
//!     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.to_owned(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &str) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Testing
//!
//! Enable the `test-util` feature for [`testing::MockStore`], an in-memory store
//! that records every operation and supports failure injection.

mod clock;
mod error;
mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use clock::Clock;
pub use error::{Error, Result};
pub use store::CacheStore;
