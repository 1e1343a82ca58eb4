// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Function-result caching with pluggable stores, key templates, and a
//! two-tier stale-while-revalidate protocol.
//!
//! This crate memoizes deterministic async functions behind derived cache
//! keys:
//! - Key templates (`"user:{user_id}"`) compile once, at decoration time,
//!   against the function's declared parameter names.
//! - Serialization is an injected codec pair; `"bin"` (bincode) and `"json"`
//!   ship built in, and anything else plugs in via
//!   [`serializer::Codec::custom`].
//! - TTLs support per-decoration jitter (fuzzy TTL) and per-call overrides
//!   via [`Computed::WithTtl`].
//! - The [`tiered`] wrappers compose a fast near cache with an authoritative
//!   cache that embeds a freshness deadline, serving stale values while
//!   recomputation happens synchronously or on an offload worker.
//!
//! # Single-store caching
//!
//! ```
//! use recall::{CacheFactory, Computed};
//! use recall_memory::InMemoryStore;
//! use recall_store::Clock;
//! use std::convert::Infallible;
//! use std::time::Duration;
//! # futures::executor::block_on(async {
//!
//! let factory = CacheFactory::new(InMemoryStore::new(Clock::system()));
//!
//! let user_name = factory
//!     .wrap("user:{user_id}")
//!     .params(&["user_id"])
//!     .ttl(Duration::from_secs(300))
//!     .build(|(user_id,): (u64,)| async move {
//!         Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
//!     })?;
//!
//! // First call computes and caches; the second is served from the store.
//! assert_eq!(user_name.call((7,)).await?, "user-7");
//! assert_eq!(user_name.call((7,)).await?, "user-7");
//! # Ok::<(), recall::Error>(())
//! # });
//! ```
//!
//! # Two tiers with offloaded refresh
//!
//! ```
//! use recall::{Computed, TieredCacheFactory, offload};
//! use recall_memory::InMemoryStore;
//! use recall_store::Clock;
//! use std::convert::Infallible;
//! use std::time::Duration;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::frozen(20);
//! let (queue, mut receiver) = offload::local_queue();
//! let factory = TieredCacheFactory::new(
//!     InMemoryStore::new(clock.clone()),
//!     InMemoryStore::new(clock.clone()),
//! )
//! .clock(clock.clone())
//! .offload(queue);
//!
//! let user = factory
//!     .wrap("user:{user_id}")
//!     .params(&["user_id"])
//!     .ttl1(Duration::from_secs(5))
//!     .fuzzy_ttl(false)
//!     .build(|(user_id,): (u64,)| async move {
//!         Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
//!     })?;
//!
//! assert_eq!(user.call((1,)).await?, "user-1");
//!
//! // Later, a worker drains the queue through the factory's registry:
//! let registry = factory.registry();
//! while let Some(message) = receiver.try_recv() {
//!     registry.dispatch(message).await;
//! }
//! # Ok::<(), recall::Error>(())
//! # });
//! ```
//!
//! # Concurrency
//!
//! Wrappers are immutable after construction and safe to share as long as
//! their stores are. They hold no locks and do no single-flight merging:
//! concurrent misses for one key may each invoke the function, and
//! concurrent stale reads may trigger duplicate refreshes. Both races are
//! accepted; the last write wins and the tiers self-heal on the next read.

pub mod builder;
mod computed;
mod error;
pub mod key;
pub mod objects;
pub mod offload;
pub mod serializer;
pub mod tiered;
pub mod ttl;
pub mod wrapper;

#[doc(inline)]
pub use builder::{CacheFactory, TieredCacheFactory};
#[doc(inline)]
pub use computed::Computed;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use objects::ObjectsCacheWrapper;
#[doc(inline)]
pub use offload::{OffloadMessage, OffloadQueue, OffloadRegistry, OffloadWorker};
#[doc(inline)]
pub use recall_store::{CacheStore, Clock};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use recall_memory::InMemoryStore;
#[doc(inline)]
pub use serializer::{Codec, Serializers};
#[doc(inline)]
pub use tiered::{TieredCacheWrapper, TieredObjectsCacheWrapper};
#[doc(inline)]
pub use wrapper::CacheWrapper;

#[cfg(any(test, feature = "test-util"))]
#[doc(inline)]
pub use recall_store::testing::{MockStore, StoreOp};
