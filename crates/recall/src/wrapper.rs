// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The single-key cache wrapper: memoize one value per derived key.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use recall_store::CacheStore;

use crate::Computed;
use crate::error::{Error, Result};
use crate::key::{KeyArgs, KeySource};
use crate::serializer::Codec;

/// Memoizes a function behind a cache store.
///
/// Built by [`CacheFactory::wrap`](crate::builder::CacheFactory::wrap); owns
/// the wrapped function, the store handle, the compiled key function, the
/// codec, and the effective TTL. The wrapper is immutable after construction
/// and safe to share across tasks as long as the store is.
///
/// The wrapper performs no locking and no single-flight merging: concurrent
/// misses for the same key may each invoke the function. That race is
/// accepted; the last write wins.
///
/// # Examples
///
/// ```
/// use recall::{CacheFactory, Computed};
/// use recall_memory::InMemoryStore;
/// use recall_store::Clock;
/// use std::convert::Infallible;
/// # futures::executor::block_on(async {
///
/// let factory = CacheFactory::new(InMemoryStore::new(Clock::system()));
/// let user_name = factory
///     .wrap("user:{user_id}")
///     .params(&["user_id"])
///     .build(|(user_id,): (u64,)| async move {
///         Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
///     })?;
///
/// assert_eq!(user_name.call((7,)).await?, "user-7");
/// # Ok::<(), recall::Error>(())
/// # });
/// ```
pub struct CacheWrapper<A, V, S, F> {
    func: F,
    store: Arc<S>,
    key: KeySource<A>,
    codec: Codec<V>,
    ttl: Duration,
    _marker: PhantomData<fn(A) -> V>,
}

impl<A, V, S, F> std::fmt::Debug for CacheWrapper<A, V, S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWrapper")
            .field("key", &self.key)
            .field("codec", &self.codec)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<A, V, S, F> CacheWrapper<A, V, S, F>
where
    A: KeyArgs,
    V: Send + Sync + 'static,
    S: CacheStore,
{
    pub(crate) fn new(func: F, store: Arc<S>, key: KeySource<A>, codec: Codec<V>, ttl: Duration) -> Self {
        Self {
            func,
            store,
            key,
            codec,
            ttl,
            _marker: PhantomData,
        }
    }

    /// Returns the cached value for `args`, computing and caching it on a miss.
    ///
    /// On a miss the wrapped function runs; a
    /// [`Computed::WithTtl`] result overrides the wrapper's TTL for that one
    /// write. The caller always receives the function's value directly —
    /// only cache hits go through the codec.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate, as does a failure of the wrapped
    /// function ([`Error::Upstream`]) — on a miss there is no cached value
    /// to fall back to.
    pub async fn call<Fut, E>(&self, args: A) -> Result<V>
    where
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = self.key.key(&args);
        if let Some(bytes) = self.store.get(&key).await? {
            return self.codec.decode(&bytes);
        }

        let computed = (self.func)(args).await.map_err(Error::upstream)?;
        let (value, ttl_override) = computed.into_parts();
        let bytes = self.codec.encode(&value)?;
        self.store.set(&key, bytes, ttl_override.unwrap_or(self.ttl)).await?;
        Ok(value)
    }

    /// Returns the cached value for `args` without ever invoking the function.
    ///
    /// Absent keys and empty stored payloads both read as `None`.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate.
    pub async fn peek(&self, args: &A) -> Result<Option<V>> {
        let key = self.key.key(args);
        match self.store.get(&key).await? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(self.codec.decode(&bytes)?)),
            _ => Ok(None),
        }
    }

    /// Writes `value` through to the cache, bypassing the function.
    ///
    /// Always uses the wrapper's configured TTL; there is no override path
    /// for explicit writes.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate.
    pub async fn put(&self, value: &V, args: &A) -> Result<()> {
        let key = self.key.key(args);
        let bytes = self.codec.encode(value)?;
        self.store.set(&key, bytes, self.ttl).await?;
        Ok(())
    }

    /// Removes the cached value for `args`.
    ///
    /// # Errors
    ///
    /// Store failures propagate.
    pub async fn invalidate(&self, args: &A) -> Result<()> {
        self.store.delete(&self.key.key(args)).await?;
        Ok(())
    }

    /// Returns the effective TTL this wrapper writes with.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
