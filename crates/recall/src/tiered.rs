// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The two-tier cache wrapper: a fast near cache in front of an authoritative
//! cache, with stale-while-revalidate refresh.
//!
//! Tier1 holds the raw encoded value with a short TTL. Tier2 outlives it and
//! stores the value behind an embedded freshness deadline (see [`envelope`]),
//! so a tier1 miss can still be served from tier2 while the value is
//! recomputed — synchronously by the reading caller, or deferred to an
//! offload worker, depending on how the factory was configured.
//!
//! The read path per key:
//!
//! 1. Tier1 hit: decode and return. Nothing else happens.
//! 2. Tier1 miss, tier2 hit: re-warm tier1 with tier2's payload, return the
//!    decoded value, and — when the embedded deadline has passed — trigger a
//!    refresh. The triggering caller is the only one that ever waits on a
//!    synchronous refresh; offload mode never blocks anyone.
//! 3. Both miss: invoke the function, write both tiers, return the fresh
//!    value. Failures here propagate — there is no cached fallback.
//!
//! A successful refresh rewrites both tiers with a new deadline of
//! `now + ttl1`. A failed refresh is logged and the stale value stands until
//! tier2's own TTL expires it, after which the next read lands in step 3.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use recall_store::{CacheStore, Clock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Computed;
use crate::error::{Error, Result};
use crate::key::{BatchKeySource, KeyArgs, KeySource};
use crate::objects::partition_by_ttl;
use crate::offload::{OffloadMessage, OffloadQueue, OffloadTarget};
use crate::serializer::Codec;

/// The tier2 wire envelope: `ascii_digits(expire_unix_ts) ++ b":" ++ payload`.
///
/// This is the one bit-exact format in the system. The split happens once,
/// from the left, so payloads containing `:` are unaffected.
pub mod envelope {
    use crate::error::{Error, Result};

    /// Prefixes `payload` with an absolute expiry timestamp.
    #[must_use]
    pub fn seal(expires_at: u64, payload: &[u8]) -> Vec<u8> {
        let mut sealed = expires_at.to_string().into_bytes();
        sealed.push(b':');
        sealed.extend_from_slice(payload);
        sealed
    }

    /// Splits a sealed entry into its expiry timestamp and payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEntry`] when the separator is missing or the
    /// prefix is not a base-10 unix timestamp.
    pub fn unseal(sealed: &[u8]) -> Result<(u64, &[u8])> {
        let split = sealed
            .iter()
            .position(|byte| *byte == b':')
            .ok_or_else(|| Error::MalformedEntry("missing ':' separator".to_owned()))?;
        let expires_at = std::str::from_utf8(&sealed[..split])
            .ok()
            .and_then(|prefix| prefix.parse().ok())
            .ok_or_else(|| Error::MalformedEntry("expiry prefix is not a unix timestamp".to_owned()))?;
        Ok((expires_at, &sealed[split + 1..]))
    }
}

/// How a wrapper reacts to a stale tier2 read.
#[derive(Clone)]
pub(crate) enum RefreshMode {
    /// The reading caller recomputes inline (and swallows compute failures).
    Sync,
    /// A refresh message is enqueued; the caller returns the stale value
    /// immediately.
    Offload(Arc<dyn OffloadQueue>),
}

impl std::fmt::Debug for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => f.write_str("Sync"),
            Self::Offload(_) => f.write_str("Offload"),
        }
    }
}

/// Memoizes a function behind a near cache (tier1) and an authoritative
/// cache (tier2).
///
/// Built by [`TieredCacheFactory::wrap`](crate::builder::TieredCacheFactory::wrap),
/// which also registers the wrapper in the factory's offload registry under
/// its `cache_id`. See the [module docs](self) for the read protocol.
///
/// No per-key mutual exclusion is provided: concurrent readers of the same
/// stale key may trigger duplicate refreshes, which is accepted.
pub struct TieredCacheWrapper<A, V, S1, S2, F> {
    cache_id: String,
    func: F,
    tier1: Arc<S1>,
    tier2: Arc<S2>,
    key: KeySource<A>,
    codec: Codec<V>,
    ttl1: Duration,
    ttl2: Duration,
    clock: Clock,
    mode: RefreshMode,
    _marker: PhantomData<fn(A) -> V>,
}

impl<A, V, S1, S2, F> std::fmt::Debug for TieredCacheWrapper<A, V, S1, S2, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheWrapper")
            .field("cache_id", &self.cache_id)
            .field("key", &self.key)
            .field("ttl1", &self.ttl1)
            .field("ttl2", &self.ttl2)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<A, V, S1, S2, F> TieredCacheWrapper<A, V, S1, S2, F>
where
    A: KeyArgs + Serialize + DeserializeOwned,
    V: Send + Sync + 'static,
    S1: CacheStore,
    S2: CacheStore,
{
    #[expect(clippy::too_many_arguments, reason = "assembled only by the factory builder")]
    pub(crate) fn new(
        cache_id: String,
        func: F,
        tier1: Arc<S1>,
        tier2: Arc<S2>,
        key: KeySource<A>,
        codec: Codec<V>,
        ttl1: Duration,
        ttl2: Duration,
        clock: Clock,
        mode: RefreshMode,
    ) -> Self {
        Self {
            cache_id,
            func,
            tier1,
            tier2,
            key,
            codec,
            ttl1,
            ttl2,
            clock,
            mode,
            _marker: PhantomData,
        }
    }

    /// Returns the identity this wrapper is registered under for offload
    /// dispatch.
    #[must_use]
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Returns the cached value for `args`, recomputing per the two-tier
    /// protocol.
    ///
    /// A value served from tier2 may be stale; staleness triggers a refresh
    /// but the stale value is still returned. Only a miss in both tiers
    /// blocks on (and propagates failures of) the wrapped function.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate. [`Error::Upstream`] is returned
    /// only from the both-tiers-miss path; refresh failures are logged
    /// instead, because a (stale) value is available to serve.
    pub async fn call<Fut, E>(&self, args: A) -> Result<V>
    where
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let key = self.key.key(&args);
        if let Some(bytes) = self.tier1.get(&key).await? {
            return self.codec.decode(&bytes);
        }

        let Some(sealed) = self.tier2.get(&key).await? else {
            // Miss in both tiers: compute synchronously, failures propagate.
            let computed = (self.func)(args).await.map_err(Error::upstream)?;
            let (value, ttl_override) = computed.into_parts();
            let bytes = self.codec.encode(&value)?;
            self.store_both(&key, bytes, ttl_override).await?;
            return Ok(value);
        };

        let (expires_at, payload) = envelope::unseal(&sealed)?;
        // Re-warm tier1 with the known-good payload before any refresh; a
        // successful refresh overwrites it with the fresh value right after.
        self.tier1.set(&key, payload.to_vec(), self.ttl1).await?;
        let value = self.codec.decode(payload)?;

        if self.clock.now() > expires_at {
            tracing::debug!(cache_id = %self.cache_id, key = %key, "stale entry, triggering refresh");
            self.refresh_stale(&key, &args).await?;
        }
        Ok(value)
    }

    /// Writes the value to both tiers; the freshness deadline tracks `ttl1`
    /// (or the per-call override), not tier2's entry lifetime.
    async fn store_both(&self, key: &str, bytes: Vec<u8>, ttl_override: Option<Duration>) -> Result<()> {
        let ttl1 = ttl_override.unwrap_or(self.ttl1);
        let expires_at = self.clock.now() + ttl1.as_secs();
        self.tier1.set(key, bytes.clone(), ttl1).await?;
        self.tier2.set(key, envelope::seal(expires_at, &bytes), self.ttl2).await?;
        Ok(())
    }

    /// Triggers the configured refresh for a stale key.
    ///
    /// Sync mode recomputes inline: compute failures are logged and
    /// swallowed (the stale value is being served), store failures
    /// propagate. Offload mode enqueues and never fails the caller.
    async fn refresh_stale<Fut, E>(&self, key: &str, args: &A) -> Result<()>
    where
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        match &self.mode {
            RefreshMode::Sync => match (self.func)(args.clone()).await {
                Ok(computed) => {
                    let (value, ttl_override) = computed.into_parts();
                    let bytes = self.codec.encode(&value)?;
                    self.store_both(key, bytes, ttl_override).await
                }
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, key = %key, error = %cause, "refresh failed, serving stale value");
                    Ok(())
                }
            },
            RefreshMode::Offload(queue) => {
                match OffloadMessage::single(&self.cache_id, key, args) {
                    Ok(message) => {
                        if let Err(cause) = queue.enqueue(message) {
                            tracing::warn!(cache_id = %self.cache_id, key = %key, error = %cause, "offload enqueue failed, dropping refresh request");
                        }
                    }
                    Err(cause) => {
                        tracing::warn!(cache_id = %self.cache_id, key = %key, error = %cause, "could not serialize offload message");
                    }
                }
                Ok(())
            }
        }
    }

    /// Executes a refresh with no caller to report to: every failure is
    /// logged and swallowed. Used by the offload dispatch path.
    async fn refresh_detached<Fut, E>(&self, key: &str, args: A)
    where
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        match (self.func)(args).await {
            Ok(computed) => {
                let (value, ttl_override) = computed.into_parts();
                match self.codec.encode(&value) {
                    Ok(bytes) => {
                        if let Err(cause) = self.store_both(key, bytes, ttl_override).await {
                            tracing::error!(cache_id = %self.cache_id, key = %key, error = %cause, "failed to store refreshed value");
                        }
                    }
                    Err(cause) => {
                        tracing::error!(cache_id = %self.cache_id, key = %key, error = %cause, "failed to encode refreshed value");
                    }
                }
            }
            Err(cause) => {
                tracing::error!(cache_id = %self.cache_id, key = %key, error = %cause, "offloaded refresh failed");
            }
        }
    }

    /// Returns the tier2 value for `args` without invoking the function,
    /// ignoring the freshness deadline.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate.
    pub async fn peek(&self, args: &A) -> Result<Option<V>> {
        let key = self.key.key(args);
        match self.tier2.get(&key).await? {
            Some(sealed) if !sealed.is_empty() => {
                let (_, payload) = envelope::unseal(&sealed)?;
                Ok(Some(self.codec.decode(payload)?))
            }
            _ => Ok(None),
        }
    }

    /// Writes `value` to tier2, bypassing the function.
    ///
    /// The entry's freshness deadline is `now + ttl1`; tier1 picks the value
    /// up on the next read that misses it.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate.
    pub async fn put(&self, value: &V, args: &A) -> Result<()> {
        let key = self.key.key(args);
        let bytes = self.codec.encode(value)?;
        let expires_at = self.clock.now() + self.ttl1.as_secs();
        self.tier2.set(&key, envelope::seal(expires_at, &bytes), self.ttl2).await?;
        Ok(())
    }

    /// Removes the tier2 entry for `args`.
    ///
    /// Tier1 is left to drain on its own TTL, so readers may observe the old
    /// value for up to `ttl1` after an invalidation.
    ///
    /// # Errors
    ///
    /// Store failures propagate.
    pub async fn invalidate(&self, args: &A) -> Result<()> {
        self.tier2.delete(&self.key.key(args)).await?;
        Ok(())
    }
}

impl<A, V, S1, S2, F, Fut, E> OffloadTarget for TieredCacheWrapper<A, V, S1, S2, F>
where
    A: KeyArgs + Serialize + DeserializeOwned,
    V: Send + Sync + 'static,
    S1: CacheStore + 'static,
    S2: CacheStore + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    fn handle(&self, message: OffloadMessage) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let args: A = match serde_json::from_value(message.args) {
                Ok(args) => args,
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, error = %cause, "offload message carried unusable args");
                    return;
                }
            };
            let key = match message.keys.first() {
                Some(key) => key.clone(),
                None => self.key.key(&args),
            };
            self.refresh_detached(&key, args).await;
        })
    }
}

/// The batch (objects) counterpart of [`TieredCacheWrapper`].
///
/// Extends the objects wrapper's partial-hit handling with the tier2
/// stale/absent partition: ids whose tier2 entry is merely stale are served
/// and refreshed (batched into one deferred request, or one inline re-fetch
/// in sync mode), while ids absent from both tiers are fetched synchronously.
/// The two sets never overlap.
pub struct TieredObjectsCacheWrapper<I, A, V, S1, S2, F> {
    cache_id: String,
    func: F,
    tier1: Arc<S1>,
    tier2: Arc<S2>,
    key: BatchKeySource<I, A>,
    codec: Codec<V>,
    ttl1: Duration,
    ttl2: Duration,
    clock: Clock,
    mode: RefreshMode,
    _marker: PhantomData<fn(I, A) -> V>,
}

impl<I, A, V, S1, S2, F> std::fmt::Debug for TieredObjectsCacheWrapper<I, A, V, S1, S2, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredObjectsCacheWrapper")
            .field("cache_id", &self.cache_id)
            .field("key", &self.key)
            .field("ttl1", &self.ttl1)
            .field("ttl2", &self.ttl2)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<I, A, V, S1, S2, F> TieredObjectsCacheWrapper<I, A, V, S1, S2, F>
where
    I: Display + Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    A: KeyArgs + Serialize + DeserializeOwned,
    V: Send + Sync + 'static,
    S1: CacheStore,
    S2: CacheStore,
{
    #[expect(clippy::too_many_arguments, reason = "assembled only by the factory builder")]
    pub(crate) fn new(
        cache_id: String,
        func: F,
        tier1: Arc<S1>,
        tier2: Arc<S2>,
        key: BatchKeySource<I, A>,
        codec: Codec<V>,
        ttl1: Duration,
        ttl2: Duration,
        clock: Clock,
        mode: RefreshMode,
    ) -> Self {
        Self {
            cache_id,
            func,
            tier1,
            tier2,
            key,
            codec,
            ttl1,
            ttl2,
            clock,
            mode,
            _marker: PhantomData,
        }
    }

    /// Returns the identity this wrapper is registered under for offload
    /// dispatch.
    #[must_use]
    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Returns the cached values for `ids`, consulting tier1, then tier2,
    /// then the wrapped function for whatever is still missing.
    ///
    /// Stale tier2 entries are included in the result and queued for
    /// refresh; only ids absent from both tiers cost a synchronous fetch.
    ///
    /// # Errors
    ///
    /// Store and codec failures propagate, as does a failure of the wrapped
    /// function for the both-tiers-missing ids.
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
        for (id, bytes) in ids.iter().zip(self.tier1.mget(&keys).await?) {
            if let Some(bytes) = bytes {
                result.insert(id.clone(), self.codec.decode(&bytes)?);
            }
        }

        let mut seen = HashSet::new();
        let pending: Vec<I> = ids
            .iter()
            .filter(|id| !result.contains_key(*id) && seen.insert((*id).clone()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return Ok(result);
        }

        let pending_keys = self.key.keys(&pending, &args);
        let sealed_values = self.tier2.mget(&pending_keys).await?;

        let now = self.clock.now();
        let mut warm_pairs = Vec::new();
        let mut stale_ids = Vec::new();
        let mut ids_to_fetch = Vec::new();
        for ((id, key), sealed) in pending.iter().zip(&pending_keys).zip(sealed_values) {
            match sealed {
                Some(sealed) => {
                    let (expires_at, payload) = envelope::unseal(&sealed)?;
                    result.insert(id.clone(), self.codec.decode(payload)?);
                    warm_pairs.push((key.clone(), payload.to_vec()));
                    if now > expires_at {
                        stale_ids.push(id.clone());
                    }
                }
                None => ids_to_fetch.push(id.clone()),
            }
        }

        if !warm_pairs.is_empty() {
            self.tier1.mset(warm_pairs, self.ttl1).await?;
        }
        if !stale_ids.is_empty() {
            self.refresh_stale(stale_ids, &args).await?;
        }
        if !ids_to_fetch.is_empty() {
            let fresh = (self.func)(ids_to_fetch, args.clone()).await.map_err(Error::upstream)?;
            for (id, value) in self.store_fresh(fresh, &args).await? {
                result.insert(id, value);
            }
        }
        Ok(result)
    }

    /// Writes fresh results to both tiers, bucketed by effective TTL, and
    /// returns the written entries for merging.
    async fn store_fresh(&self, fresh: HashMap<I, Computed<V>>, args: &A) -> Result<Vec<(I, V)>> {
        let now = self.clock.now();
        let mut written = Vec::with_capacity(fresh.len());
        for (ttl, entries) in partition_by_ttl(fresh, self.ttl1) {
            let bucket_ids: Vec<I> = entries.iter().map(|(id, _)| id.clone()).collect();
            let keys = self.key.keys(&bucket_ids, args);
            let expires_at = now + ttl.as_secs();
            let mut warm_pairs = Vec::with_capacity(entries.len());
            let mut sealed_pairs = Vec::with_capacity(entries.len());
            for (key, (_, value)) in keys.into_iter().zip(&entries) {
                let bytes = self.codec.encode(value)?;
                sealed_pairs.push((key.clone(), envelope::seal(expires_at, &bytes)));
                warm_pairs.push((key, bytes));
            }
            self.tier1.mset(warm_pairs, ttl).await?;
            self.tier2.mset(sealed_pairs, self.ttl2).await?;
            written.extend(entries);
        }
        Ok(written)
    }

    /// Refreshes the stale ids: one batched offload message, or one inline
    /// re-fetch in sync mode (compute failures logged, stale values stand).
    async fn refresh_stale<Fut, E>(&self, stale_ids: Vec<I>, args: &A) -> Result<()>
    where
        F: Fn(Vec<I>, A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        match &self.mode {
            RefreshMode::Sync => match (self.func)(stale_ids, args.clone()).await {
                Ok(fresh) => {
                    self.store_fresh(fresh, args).await?;
                    Ok(())
                }
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, error = %cause, "batch refresh failed, serving stale values");
                    Ok(())
                }
            },
            RefreshMode::Offload(queue) => {
                let keys = self.key.keys(&stale_ids, args);
                match OffloadMessage::batch(&self.cache_id, keys, &stale_ids, args) {
                    Ok(message) => {
                        if let Err(cause) = queue.enqueue(message) {
                            tracing::warn!(cache_id = %self.cache_id, error = %cause, "offload enqueue failed, dropping batch refresh request");
                        }
                    }
                    Err(cause) => {
                        tracing::warn!(cache_id = %self.cache_id, error = %cause, "could not serialize batch offload message");
                    }
                }
                Ok(())
            }
        }
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

    /// Removes the tier2 entries for `ids` with one batched delete.
    ///
    /// As with the single-key wrapper, tier1 drains on its own TTL.
    ///
    /// # Errors
    ///
    /// Store failures propagate.
    pub async fn invalidate(&self, ids: impl IntoIterator<Item = I>, args: &A) -> Result<()> {
        let ids: Vec<I> = ids.into_iter().collect();
        let keys = self.key.keys(&ids, args);
        self.tier2.mdelete(&keys).await?;
        Ok(())
    }
}

impl<I, A, V, S1, S2, F, Fut, E> OffloadTarget for TieredObjectsCacheWrapper<I, A, V, S1, S2, F>
where
    I: Display + Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    A: KeyArgs + Serialize + DeserializeOwned,
    V: Send + Sync + 'static,
    S1: CacheStore + 'static,
    S2: CacheStore + 'static,
    F: Fn(Vec<I>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    fn handle(&self, message: OffloadMessage) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let args: A = match serde_json::from_value(message.args) {
                Ok(args) => args,
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, error = %cause, "offload message carried unusable args");
                    return;
                }
            };
            let ids: Vec<I> = match message.ids.map(serde_json::from_value).transpose() {
                Ok(Some(ids)) => ids,
                Ok(None) => {
                    tracing::error!(cache_id = %self.cache_id, "batch offload message carried no ids");
                    return;
                }
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, error = %cause, "offload message carried unusable ids");
                    return;
                }
            };

            match (self.func)(ids, args.clone()).await {
                Ok(fresh) => {
                    if let Err(cause) = self.store_fresh(fresh, &args).await {
                        tracing::error!(cache_id = %self.cache_id, error = %cause, "failed to store batch-refreshed values");
                    }
                }
                Err(cause) => {
                    tracing::error!(cache_id = %self.cache_id, error = %cause, "offloaded batch refresh failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::envelope;
    use crate::Error;

    #[test]
    fn seal_is_bit_exact() {
        assert_eq!(envelope::seal(25, b"user-1"), b"25:user-1");
    }

    #[test]
    fn unseal_splits_once_from_the_left() {
        let (expires_at, payload) = envelope::unseal(b"25:a:b").unwrap();
        assert_eq!(expires_at, 25);
        assert_eq!(payload, b"a:b");
    }

    #[test]
    fn unseal_round_trips_empty_payload() {
        let sealed = envelope::seal(31, b"");
        let (expires_at, payload) = envelope::unseal(&sealed).unwrap();
        assert_eq!(expires_at, 31);
        assert_eq!(payload, b"");
    }

    #[test]
    fn unseal_rejects_missing_separator() {
        assert!(matches!(envelope::unseal(b"25"), Err(Error::MalformedEntry(_))));
    }

    #[test]
    fn unseal_rejects_non_numeric_expiry() {
        assert!(matches!(envelope::unseal(b"soon:payload"), Err(Error::MalformedEntry(_))));
    }
}
