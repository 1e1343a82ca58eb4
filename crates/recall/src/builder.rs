// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoration factories: the entry points that turn functions into cache
//! wrappers.
//!
//! A factory carries a store (or a pair of tiers) plus shared defaults (TTL,
//! serializer format, fuzzy-TTL). Each decoration starts from
//! [`CacheFactory::wrap`] / [`CacheFactory::wrap_objects`] (or the
//! [`TieredCacheFactory`] equivalents), optionally overrides the defaults,
//! and finishes with a `build*` call that validates everything — template
//! fields, parameter arity, serializer name, TTL ordering — before the first
//! call can happen.
//!
//! Name resolution with [`build`](WrapperBuilder::build) covers the built-in
//! formats (`"json"`, `"bin"`); other codecs, including the `"text"`
//! passthrough, are injected with
//! [`build_with_codec`](WrapperBuilder::build_with_codec).

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use recall_store::{CacheStore, Clock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Computed;
use crate::error::{Error, Result};
use crate::key::{BatchKeyFn, BatchKeySource, KeyArgs, KeyFn, KeySource, check_arity};
use crate::objects::ObjectsCacheWrapper;
use crate::offload::{OffloadQueue, OffloadRegistry, OffloadTarget};
use crate::serializer::{Codec, Serializers};
use crate::tiered::{RefreshMode, TieredCacheWrapper, TieredObjectsCacheWrapper};
use crate::ttl::effective_ttl;
use crate::wrapper::CacheWrapper;

const DEFAULT_TTL: Duration = Duration::from_secs(600);
const DEFAULT_FORMAT: &str = "bin";

/// Builds single-store cache wrappers around functions.
///
/// # Examples
///
/// ```
/// use recall::{CacheFactory, Computed};
/// use recall_memory::InMemoryStore;
/// use recall_store::Clock;
/// use std::convert::Infallible;
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let factory = CacheFactory::new(InMemoryStore::new(Clock::system()))
///     .default_ttl(Duration::from_secs(300))
///     .default_format("json");
///
/// let greeting = factory
///     .wrap("greeting:{name}")
///     .params(&["name"])
///     .build(|(name,): (String,)| async move {
///         Ok::<_, Infallible>(Computed::Plain(format!("hello {name}")))
///     })?;
///
/// assert_eq!(greeting.call(("ada".to_owned(),)).await?, "hello ada");
/// # Ok::<(), recall::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct CacheFactory<S> {
    store: Arc<S>,
    default_ttl: Duration,
    default_format: String,
    fuzzy_ttl: bool,
}

impl<S: CacheStore> CacheFactory<S> {
    /// Creates a factory with the default TTL (600s), the `"bin"` format,
    /// and fuzzy TTLs enabled.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            default_ttl: DEFAULT_TTL,
            default_format: DEFAULT_FORMAT.to_owned(),
            fuzzy_ttl: true,
        }
    }

    /// Sets the TTL used when a decoration does not override it.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the serializer format used when a decoration does not override it.
    #[must_use]
    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// Enables or disables TTL jitter for decorations that do not override it.
    #[must_use]
    pub fn fuzzy_ttl(mut self, fuzzy: bool) -> Self {
        self.fuzzy_ttl = fuzzy;
        self
    }

    /// Starts a single-key decoration for the given key template.
    pub fn wrap(&self, template: impl Into<String>) -> WrapperBuilder<'_, S> {
        WrapperBuilder {
            factory: self,
            common: CommonConfig::new(template.into()),
        }
    }

    /// Starts a batch (objects) decoration for the given key template.
    ///
    /// The wrapped function takes a collection of ids plus rest arguments and
    /// returns a mapping of id to value; the template's `{id}` field renders
    /// the current element.
    pub fn wrap_objects(&self, template: impl Into<String>) -> ObjectsWrapperBuilder<'_, S> {
        ObjectsWrapperBuilder {
            factory: self,
            common: CommonConfig::new(template.into()),
        }
    }
}

/// Per-decoration settings shared by all builder flavors.
#[derive(Debug, Clone)]
struct CommonConfig {
    template: String,
    params: Vec<String>,
    ttl: Option<Duration>,
    format: Option<String>,
    fuzzy_ttl: Option<bool>,
}

impl CommonConfig {
    fn new(template: String) -> Self {
        Self {
            template,
            params: Vec::new(),
            ttl: None,
            format: None,
            fuzzy_ttl: None,
        }
    }

    fn param_refs(&self) -> Vec<&str> {
        self.params.iter().map(String::as_str).collect()
    }

    fn resolve_codec<V>(&self, default_format: &str) -> Result<Codec<V>>
    where
        V: Serialize + DeserializeOwned + 'static,
    {
        Serializers::with_builtins().resolve(self.format.as_deref().unwrap_or(default_format))
    }

    fn effective_ttl(&self, default_ttl: Duration, default_fuzzy: bool) -> Duration {
        effective_ttl(self.ttl.unwrap_or(default_ttl), self.fuzzy_ttl.unwrap_or(default_fuzzy))
    }
}

macro_rules! common_setters {
    () => {
        /// Declares the wrapped function's parameter names, in order.
        ///
        /// Key templates bind named fields against this list; its length
        /// must match the function's argument tuple.
        #[must_use]
        pub fn params(mut self, params: &[&str]) -> Self {
            self.common.params = params.iter().map(|&param| param.to_owned()).collect();
            self
        }

        /// Overrides the factory's default TTL for this decoration.
        #[must_use]
        pub fn ttl(mut self, ttl: Duration) -> Self {
            self.common.ttl = Some(ttl);
            self
        }

        /// Overrides the factory's default serializer format for this
        /// decoration.
        #[must_use]
        pub fn format(mut self, format: impl Into<String>) -> Self {
            self.common.format = Some(format.into());
            self
        }

        /// Overrides the factory's fuzzy-TTL setting for this decoration.
        #[must_use]
        pub fn fuzzy_ttl(mut self, fuzzy: bool) -> Self {
            self.common.fuzzy_ttl = Some(fuzzy);
            self
        }
    };
}

/// Builder for a single-key decoration; created by [`CacheFactory::wrap`].
#[derive(Debug)]
pub struct WrapperBuilder<'f, S> {
    factory: &'f CacheFactory<S>,
    common: CommonConfig,
}

impl<S: CacheStore> WrapperBuilder<'_, S> {
    common_setters!();

    /// Builds the wrapper, resolving the serializer by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template or arity problems and
    /// [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build<A, V, F, Fut, E>(self, func: F) -> Result<CacheWrapper<A, V, S, F>>
    where
        A: KeyArgs,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        self.build_with_codec(codec, func)
    }

    /// Builds the wrapper with an explicitly injected codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template or arity problems.
    pub fn build_with_codec<A, V, F, Fut, E>(self, codec: Codec<V>, func: F) -> Result<CacheWrapper<A, V, S, F>>
    where
        A: KeyArgs,
        V: Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let params = self.common.param_refs();
        check_arity::<A>(&params)?;
        let keyfn = KeyFn::compile(&self.common.template, &params)?;
        let ttl = self.common.effective_ttl(self.factory.default_ttl, self.factory.fuzzy_ttl);
        Ok(CacheWrapper::new(
            func,
            Arc::clone(&self.factory.store),
            KeySource::Template(keyfn),
            codec,
            ttl,
        ))
    }

    /// Builds the wrapper with a caller-supplied key function instead of the
    /// template (the identity escape hatch); the template and declared
    /// params are not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build_with_key<A, V, F, Fut, E>(
        self,
        key_fn: impl Fn(&A) -> String + Send + Sync + 'static,
        func: F,
    ) -> Result<CacheWrapper<A, V, S, F>>
    where
        A: KeyArgs,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        let ttl = self.common.effective_ttl(self.factory.default_ttl, self.factory.fuzzy_ttl);
        Ok(CacheWrapper::new(
            func,
            Arc::clone(&self.factory.store),
            KeySource::Custom(Arc::new(key_fn)),
            codec,
            ttl,
        ))
    }
}

/// Builder for a batch (objects) decoration; created by
/// [`CacheFactory::wrap_objects`].
#[derive(Debug)]
pub struct ObjectsWrapperBuilder<'f, S> {
    factory: &'f CacheFactory<S>,
    common: CommonConfig,
}

/// Splits an objects-mode parameter list into the leading id-collection
/// parameter (excluded from binding) and the rest.
fn rest_params(params: &[&str]) -> Result<Vec<String>> {
    if params.is_empty() {
        return Err(Error::configuration(
            "objects mode requires the id collection as the first declared parameter",
        ));
    }
    Ok(params[1..].iter().map(|&param| param.to_owned()).collect())
}

impl<S: CacheStore> ObjectsWrapperBuilder<'_, S> {
    common_setters!();

    /// Builds the wrapper, resolving the serializer by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template or arity problems and
    /// [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build<I, A, V, F, Fut, E>(self, func: F) -> Result<ObjectsCacheWrapper<I, A, V, S, F>>
    where
        I: Display + Eq + Hash + Clone + Send + Sync + 'static,
        A: KeyArgs,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(Vec<I>, A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        self.build_with_codec(codec, func)
    }

    /// Builds the wrapper with an explicitly injected codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template or arity problems.
    pub fn build_with_codec<I, A, V, F, Fut, E>(
        self,
        codec: Codec<V>,
        func: F,
    ) -> Result<ObjectsCacheWrapper<I, A, V, S, F>>
    where
        I: Display + Eq + Hash + Clone + Send + Sync + 'static,
        A: KeyArgs,
        V: Send + Sync + 'static,
        F: Fn(Vec<I>, A) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let params = self.common.param_refs();
        let rest = rest_params(&params)?;
        let rest_refs: Vec<&str> = rest.iter().map(String::as_str).collect();
        check_arity::<A>(&rest_refs)?;
        let keyfn = BatchKeyFn::compile(&self.common.template, &rest_refs)?;
        let ttl = self.common.effective_ttl(self.factory.default_ttl, self.factory.fuzzy_ttl);
        Ok(ObjectsCacheWrapper::new(
            func,
            Arc::clone(&self.factory.store),
            BatchKeySource::Template(keyfn),
            codec,
            ttl,
        ))
    }
}

/// Builds two-tier cache wrappers with stale-while-revalidate refresh.
///
/// Without an [`offload`](Self::offload) queue, stale reads refresh
/// synchronously in the triggering caller. With one, stale reads enqueue a
/// refresh message and return immediately; the factory's
/// [`registry`](Self::registry) routes dispatched messages back to the right
/// wrapper.
///
/// # Examples
///
/// ```
/// use recall::{Computed, TieredCacheFactory};
/// use recall_store::{Clock, testing::MockStore};
/// use std::convert::Infallible;
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let factory = TieredCacheFactory::new(MockStore::new(), MockStore::new())
///     .clock(Clock::frozen(20))
///     .fuzzy_ttl(false);
///
/// let user = factory
///     .wrap("user:{user_id}")
///     .params(&["user_id"])
///     .ttl1(Duration::from_secs(5))
///     .ttl2(Duration::from_secs(10))
///     .format("json")
///     .build(|(user_id,): (u64,)| async move {
///         Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
///     })?;
///
/// assert_eq!(user.call((1,)).await?, "user-1");
/// # Ok::<(), recall::Error>(())
/// # });
/// ```
pub struct TieredCacheFactory<S1, S2> {
    tier1: Arc<S1>,
    tier2: Arc<S2>,
    clock: Clock,
    default_ttl1: Duration,
    default_ttl2: Option<Duration>,
    default_format: String,
    fuzzy_ttl: bool,
    registry: Arc<OffloadRegistry>,
    queue: Option<Arc<dyn OffloadQueue>>,
}

impl<S1, S2> std::fmt::Debug for TieredCacheFactory<S1, S2> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCacheFactory")
            .field("default_ttl1", &self.default_ttl1)
            .field("default_ttl2", &self.default_ttl2)
            .field("default_format", &self.default_format)
            .field("fuzzy_ttl", &self.fuzzy_ttl)
            .field("offload", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}

impl<S1: CacheStore, S2: CacheStore> TieredCacheFactory<S1, S2> {
    /// Creates a factory with synchronous refresh, a system clock, the
    /// default tier1 TTL (600s), tier2 defaulting to twice tier1, the
    /// `"bin"` format, and fuzzy TTLs enabled.
    pub fn new(tier1: S1, tier2: S2) -> Self {
        Self {
            tier1: Arc::new(tier1),
            tier2: Arc::new(tier2),
            clock: Clock::system(),
            default_ttl1: DEFAULT_TTL,
            default_ttl2: None,
            default_format: DEFAULT_FORMAT.to_owned(),
            fuzzy_ttl: true,
            registry: Arc::new(OffloadRegistry::new()),
            queue: None,
        }
    }

    /// Sets the clock used for freshness deadlines.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the tier1 TTL used when a decoration does not override it.
    #[must_use]
    pub fn default_ttl1(mut self, ttl1: Duration) -> Self {
        self.default_ttl1 = ttl1;
        self
    }

    /// Sets the tier2 TTL used when a decoration does not override it.
    ///
    /// When neither the factory nor the decoration sets one, tier2 entries
    /// live twice the decoration's nominal tier1 TTL.
    #[must_use]
    pub fn default_ttl2(mut self, ttl2: Duration) -> Self {
        self.default_ttl2 = Some(ttl2);
        self
    }

    /// Sets the serializer format used when a decoration does not override it.
    #[must_use]
    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = format.into();
        self
    }

    /// Enables or disables TTL jitter for decorations that do not override it.
    #[must_use]
    pub fn fuzzy_ttl(mut self, fuzzy: bool) -> Self {
        self.fuzzy_ttl = fuzzy;
        self
    }

    /// Switches stale-read refresh from synchronous to offloaded through the
    /// given transport.
    #[must_use]
    pub fn offload(mut self, queue: impl OffloadQueue + 'static) -> Self {
        self.queue = Some(Arc::new(queue));
        self
    }

    /// Returns the registry that routes offload messages back to the
    /// wrappers this factory built.
    #[must_use]
    pub fn registry(&self) -> Arc<OffloadRegistry> {
        Arc::clone(&self.registry)
    }

    fn mode(&self) -> RefreshMode {
        match &self.queue {
            Some(queue) => RefreshMode::Offload(Arc::clone(queue)),
            None => RefreshMode::Sync,
        }
    }

    /// Starts a single-key decoration for the given key template.
    pub fn wrap(&self, template: impl Into<String>) -> TieredWrapperBuilder<'_, S1, S2> {
        TieredWrapperBuilder {
            factory: self,
            common: CommonConfig::new(template.into()),
            ttl2: None,
            cache_id: None,
        }
    }

    /// Starts a batch (objects) decoration for the given key template.
    pub fn wrap_objects(&self, template: impl Into<String>) -> TieredObjectsWrapperBuilder<'_, S1, S2> {
        TieredObjectsWrapperBuilder {
            factory: self,
            common: CommonConfig::new(template.into()),
            ttl2: None,
            cache_id: None,
        }
    }
}

/// Resolves the tier TTL pair, enforcing `ttl2 >= ttl1`.
fn tier_ttls(
    nominal_ttl1: Duration,
    ttl2: Option<Duration>,
    fuzzy: bool,
) -> Result<(Duration, Duration)> {
    let ttl2 = ttl2.unwrap_or(nominal_ttl1 * 2);
    if ttl2 < nominal_ttl1 {
        return Err(Error::configuration(format!(
            "tier2 ttl ({ttl2:?}) must be at least tier1 ttl ({nominal_ttl1:?})"
        )));
    }
    Ok((effective_ttl(nominal_ttl1, fuzzy), ttl2))
}

macro_rules! tiered_setters {
    () => {
        common_setters!();

        /// Overrides the factory's tier1 TTL for this decoration.
        ///
        /// Alias of [`ttl`](Self::ttl); both set the near-cache TTL that
        /// also drives the embedded freshness deadline.
        #[must_use]
        pub fn ttl1(self, ttl1: Duration) -> Self {
            self.ttl(ttl1)
        }

        /// Overrides the tier2 entry lifetime for this decoration.
        #[must_use]
        pub fn ttl2(mut self, ttl2: Duration) -> Self {
            self.ttl2 = Some(ttl2);
            self
        }

        /// Overrides the identity this wrapper registers under for offload
        /// dispatch. Defaults to the key template string.
        #[must_use]
        pub fn cache_id(mut self, cache_id: impl Into<String>) -> Self {
            self.cache_id = Some(cache_id.into());
            self
        }
    };
}

/// Builder for a tiered single-key decoration; created by
/// [`TieredCacheFactory::wrap`].
#[derive(Debug)]
pub struct TieredWrapperBuilder<'f, S1, S2> {
    factory: &'f TieredCacheFactory<S1, S2>,
    common: CommonConfig,
    ttl2: Option<Duration>,
    cache_id: Option<String>,
}

impl<S1, S2> TieredWrapperBuilder<'_, S1, S2>
where
    S1: CacheStore + 'static,
    S2: CacheStore + 'static,
{
    tiered_setters!();

    /// Builds and registers the wrapper, resolving the serializer by name.
    ///
    /// The wrapper is returned in an [`Arc`] because the factory's offload
    /// registry keeps a handle to it for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template, arity, or TTL-ordering
    /// problems and [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build<A, V, F, Fut, E>(self, func: F) -> Result<Arc<TieredCacheWrapper<A, V, S1, S2, F>>>
    where
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        self.build_with_codec(codec, func)
    }

    /// Builds and registers the wrapper with an explicitly injected codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template, arity, or TTL-ordering
    /// problems.
    pub fn build_with_codec<A, V, F, Fut, E>(
        self,
        codec: Codec<V>,
        func: F,
    ) -> Result<Arc<TieredCacheWrapper<A, V, S1, S2, F>>>
    where
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let params = self.common.param_refs();
        check_arity::<A>(&params)?;
        let keyfn = KeyFn::compile(&self.common.template, &params)?;
        self.finish(KeySource::Template(keyfn), codec, func)
    }

    /// Builds and registers the wrapper with a caller-supplied key function
    /// (the identity escape hatch).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for TTL-ordering problems and
    /// [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build_with_key<A, V, F, Fut, E>(
        self,
        key_fn: impl Fn(&A) -> String + Send + Sync + 'static,
        func: F,
    ) -> Result<Arc<TieredCacheWrapper<A, V, S1, S2, F>>>
    where
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        self.finish(KeySource::Custom(Arc::new(key_fn)), codec, func)
    }

    fn finish<A, V, F, Fut, E>(
        self,
        key: KeySource<A>,
        codec: Codec<V>,
        func: F,
    ) -> Result<Arc<TieredCacheWrapper<A, V, S1, S2, F>>>
    where
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Computed<V>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let nominal_ttl1 = self.common.ttl.unwrap_or(self.factory.default_ttl1);
        let fuzzy = self.common.fuzzy_ttl.unwrap_or(self.factory.fuzzy_ttl);
        let (ttl1, ttl2) = tier_ttls(nominal_ttl1, self.ttl2.or(self.factory.default_ttl2), fuzzy)?;
        let cache_id = self.cache_id.unwrap_or_else(|| self.common.template.clone());

        let wrapper = Arc::new(TieredCacheWrapper::new(
            cache_id.clone(),
            func,
            Arc::clone(&self.factory.tier1),
            Arc::clone(&self.factory.tier2),
            key,
            codec,
            ttl1,
            ttl2,
            self.factory.clock.clone(),
            self.factory.mode(),
        ));
        self.factory
            .registry
            .register(cache_id, Arc::clone(&wrapper) as Arc<dyn OffloadTarget>);
        Ok(wrapper)
    }
}

/// Builder for a tiered batch decoration; created by
/// [`TieredCacheFactory::wrap_objects`].
#[derive(Debug)]
pub struct TieredObjectsWrapperBuilder<'f, S1, S2> {
    factory: &'f TieredCacheFactory<S1, S2>,
    common: CommonConfig,
    ttl2: Option<Duration>,
    cache_id: Option<String>,
}

impl<S1, S2> TieredObjectsWrapperBuilder<'_, S1, S2>
where
    S1: CacheStore + 'static,
    S2: CacheStore + 'static,
{
    tiered_setters!();

    /// Builds and registers the wrapper, resolving the serializer by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template, arity, or TTL-ordering
    /// problems and [`Error::UnknownFormat`] for an unresolvable format name.
    pub fn build<I, A, V, F, Fut, E>(self, func: F) -> Result<Arc<TieredObjectsCacheWrapper<I, A, V, S1, S2, F>>>
    where
        I: Display + Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: Fn(Vec<I>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let codec = self.common.resolve_codec(&self.factory.default_format)?;
        self.build_with_codec(codec, func)
    }

    /// Builds and registers the wrapper with an explicitly injected codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for template, arity, or TTL-ordering
    /// problems.
    pub fn build_with_codec<I, A, V, F, Fut, E>(
        self,
        codec: Codec<V>,
        func: F,
    ) -> Result<Arc<TieredObjectsCacheWrapper<I, A, V, S1, S2, F>>>
    where
        I: Display + Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
        A: KeyArgs + Serialize + DeserializeOwned,
        V: Send + Sync + 'static,
        F: Fn(Vec<I>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<HashMap<I, Computed<V>>, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let params = self.common.param_refs();
        let rest = rest_params(&params)?;
        let rest_refs: Vec<&str> = rest.iter().map(String::as_str).collect();
        check_arity::<A>(&rest_refs)?;
        let keyfn = BatchKeyFn::compile(&self.common.template, &rest_refs)?;

        let nominal_ttl1 = self.common.ttl.unwrap_or(self.factory.default_ttl1);
        let fuzzy = self.common.fuzzy_ttl.unwrap_or(self.factory.fuzzy_ttl);
        let (ttl1, ttl2) = tier_ttls(nominal_ttl1, self.ttl2.or(self.factory.default_ttl2), fuzzy)?;
        let cache_id = self.cache_id.unwrap_or_else(|| self.common.template.clone());

        let wrapper = Arc::new(TieredObjectsCacheWrapper::new(
            cache_id.clone(),
            func,
            Arc::clone(&self.factory.tier1),
            Arc::clone(&self.factory.tier2),
            BatchKeySource::Template(keyfn),
            codec,
            ttl1,
            ttl2,
            self.factory.clock.clone(),
            self.factory.mode(),
        ));
        self.factory
            .registry
            .register(cache_id, Arc::clone(&wrapper) as Arc<dyn OffloadTarget>);
        Ok(wrapper)
    }
}
