// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process cache store for the `recall` function-result cache.
//!
//! This crate provides [`InMemoryStore`], a fast near-cache backed by the moka
//! crate, which offers high-performance concurrent caching with capacity-based
//! eviction. Per-entry TTLs are enforced against an injectable
//! [`Clock`](recall_store::Clock), so expiry behavior is fully deterministic
//! under a frozen clock.
//!
//! # Examples
//!
//! ```
//! use recall_memory::InMemoryStore;
//! use recall_store::{CacheStore, Clock};
//! use std::time::Duration;
//! # futures::executor::block_on(async {
//!
//! let store = InMemoryStore::new(Clock::system());
//! store.set("key", b"value".to_vec(), Duration::from_secs(60)).await?;
//! assert_eq!(store.get("key").await?, Some(b"value".to_vec()));
//! # Ok::<(), recall_store::Error>(())
//! # });
//! ```

mod builder;
mod store;

pub use builder::InMemoryStoreBuilder;
pub use store::InMemoryStore;
