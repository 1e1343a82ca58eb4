// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The objects (batch) cache wrapper: memoize a mapping of id to value for a
//! whole collection of ids in one call.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use recall_store::CacheStore;

use crate::Computed;
use crate::error::{Error, Result};
use crate::key::{BatchKeySource, KeyArgs};
use crate::serializer::Codec;

/// Buckets fresh results by the TTL each entry should be written with: plain
/// results share the wrapper's TTL, per-item overrides get their own bucket.
pub(crate) fn partition_by_ttl<I, V>(
    fresh: HashMap<I, Computed<V>>,
    default_ttl: Duration,
) -> HashMap<Duration, Vec<(I, V)>>
where
    I: Eq + Hash,
{
    let mut buckets: HashMap<Duration, Vec<(I, V)>> = HashMap::new();
    for (id, computed) in fresh {
        let (value, ttl_override) = computed.into_parts();
        buckets.entry(ttl_override.unwrap_or(default_ttl)).or_default().push((id, value));
    }
    buckets
}

/// Memoizes a batch function (`ids -> id→value` mapping) behind a cache store.
///
/// Built by [`CacheFactory::wrap_objects`](crate::builder::CacheFactory::wrap_objects).
/// Each call fetches all requested ids with one batched read, invokes the
/// function only for the ids the store did not have, and writes fresh entries
/// back grouped by their effective TTL.
///
/// Ids the function omits from its result stay absent from the returned map,
/// signaling "not found upstream"; nothing is cached for them, so they are
/// retried on the next call.
///
/// Duplicate ids in the request collapse: each unique id is fetched at most
/// once (first-occurrence order) and appears at most once in the result.
///
/// # Examples
///
/// ```
/// use recall::{CacheFactory, Computed};
/// use recall_memory::InMemoryStore;
/// use recall_store::Clock;
/// use std::collections::HashMap;
/// use std::convert::Infallible;
/// # futures::executor::block_on(async {
///
/// let factory = CacheFactory::new(InMemoryStore::new(Clock::system()));
/// let users = factory
///     .wrap_objects("user:{id}")
///     .params(&["ids"])
///     .build(|ids: Vec<u64>, (): ()| async move {
///         Ok::<_, Infallible>(
///             ids.into_iter()
///                 .map(|id| (id, Computed::Plain(format!("user-{id}"))))
///                 .collect::<HashMap<_, _>>(),
///         )
///     })?;
///
/// let result = users.call([1, 2], ()).await?;
/// assert_eq!(result[&1], "user-1");
/// assert_eq!(result[&2], "user-2");
/// # Ok::<(), recall::Error>(())
/// # });
/// ```
pub struct ObjectsCacheWrapper<I, A, V, S, F> {
    func: F,
    store: Arc<S>,
    key: BatchKeySource<I, A>,
    codec: Codec<V>,
    ttl: Duration,
    _marker: PhantomData<fn(I, A) -> V>,
}

impl<I, A, V, S, F> std::fmt::Debug for ObjectsCacheWrapper<I, A, V, S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectsCacheWrapper")
            .field("key", &self.key)
            .field("codec", &self.codec)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<I, A, V, S, F> ObjectsCacheWrapper<I, A, V, S, F>
where
    I: Display + Eq + Hash + Clone + Send + Sync + 'static,
    A: KeyArgs,
    V: Send + Sync + 'static,
    S: CacheStore,
{
    pub(crate) fn new(func: F, store: Arc<S>, key: BatchKeySource<I, A>, codec: Codec<V>, ttl: Duration) -> Self {
        Self {
            func,
            store,
            key,
            codec,
            ttl,
            _marker: PhantomData,
        }
    }

    /// Returns the cached values for `ids`, fetching only the missing ones.
    ///
    /// The generated key list is positionally aligned with `ids`; batched
    /// store reads and writes rely on that correspondence.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate, as does a failure of the wrapped
    /// function for the missing ids.
    pub async fn call<Fut, E>(&self, ids: impl IntoIterator<Item = I>, args: A) -> Result<HashMap<I, V>>
    where
        F: Fn(Vec<I>, A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let ids: Vec<I> = ids.into_iter().collect();
        let mut result = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return Ok(result);
        }

        let keys = self.key.keys(&ids, &args);
        for (id, bytes) in ids.iter().zip(self.store.mget(&keys).await?) {
            if let Some(bytes) = bytes {
                result.insert(id.clone(), self.codec.decode(&bytes)?);
            }
        }

        // Duplicates collapse: fetch each missing id once, in first-occurrence order.
        let mut seen = HashSet::new();
        let missing: Vec<I> = ids
            .iter()
            .filter(|id| !result.contains_key(*id) && seen.insert((*id).clone()))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(result);
        }

        let fresh = (self.func)(missing, args.clone()).await.map_err(Error::upstream)?;
        if fresh.is_empty() {
            return Ok(result);
        }

        for (ttl, entries) in partition_by_ttl(fresh, self.ttl) {
            let bucket_ids: Vec<I> = entries.iter().map(|(id, _)| id.clone()).collect();
            let keys = self.key.keys(&bucket_ids, &args);
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, (_, value)) in keys.into_iter().zip(&entries) {
                pairs.push((key, self.codec.encode(value)?));
            }
            self.store.mset(pairs, ttl).await?;
            for (id, value) in entries {
                result.insert(id, value);
            }
        }
        Ok(result)
    }

    /// Convenience lookup of a single id; `None` when it is not found
    /// upstream either.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`call`](Self::call).
    pub async fn one<Fut, E>(&self, id: I, args: A) -> Result<Option<V>>
    where
        F: Fn(Vec<I>, A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut result = self.call([id.clone()], args).await?;
        Ok(result.remove(&id))
    }

    /// Removes the cached entries for `ids` with one batched delete.
    ///
    /// # Errors
    ///
    /// Store failures propagate.
    pub async fn invalidate(&self, ids: impl IntoIterator<Item = I>, args: &A) -> Result<()> {
        let ids: Vec<I> = ids.into_iter().collect();
        let keys = self.key.keys(&ids, args);
        self.store.mdelete(&keys).await?;
        Ok(())
    }

    /// Returns the effective TTL this wrapper writes plain results with.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
