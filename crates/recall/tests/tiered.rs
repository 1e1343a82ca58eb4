// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the two-tier wrapper with synchronous refresh.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use recall::serializer::Codec;
use recall::{Computed, Error, TieredCacheFactory};
use recall_store::testing::MockStore;
use recall_store::Clock;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

struct Fixture {
    tier1: MockStore,
    tier2: MockStore,
    clock: Clock,
    calls: Arc<AtomicUsize>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            tier1: MockStore::new(),
            tier2: MockStore::new(),
            clock: Clock::frozen(20),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn factory(&self) -> TieredCacheFactory<MockStore, MockStore> {
        TieredCacheFactory::new(self.tier1.clone(), self.tier2.clone())
            .clock(self.clock.clone())
            .fuzzy_ttl(false)
    }
}

#[test]
fn the_two_tier_read_protocol() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let counter = Arc::clone(&fx.calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .ttl2(Duration::from_secs(10))
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        // First read at t=20: both tiers miss, the value is computed and the
        // tier2 entry embeds the deadline 20 + ttl1 = 25.
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.tier1.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(5))));
        assert_eq!(fx.tier2.entry("user:1"), Some((b"25:user-1".to_vec(), Duration::from_secs(10))));

        // Warm tier1: terminal fast path.
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

        // Tier1 evicted, tier2 still fresh: served from tier2, tier1 re-warmed,
        // no recompute.
        fx.tier1.evict("user:1");
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.tier1.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(5))));
        assert_eq!(fx.tier2.entry("user:1"), Some((b"25:user-1".to_vec(), Duration::from_secs(10))));

        // Tier1 evicted and the deadline passed: the stale value is returned,
        // and the synchronous refresh recomputes exactly once and rewrites
        // the deadline to t + ttl1 = 31.
        fx.clock.set(26);
        fx.tier1.evict("user:1");
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.tier1.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(5))));
        assert_eq!(fx.tier2.entry("user:1"), Some((b"31:user-1".to_vec(), Duration::from_secs(10))));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn a_read_exactly_at_the_deadline_is_not_stale() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let counter = Arc::clone(&fx.calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        user.call((1,)).await?;
        fx.clock.set(25);
        fx.tier1.evict("user:1");
        user.call((1,)).await?;
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn refresh_failure_serves_the_stale_value() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let counter = Arc::clone(&fx.calls);
        let fail = Arc::new(AtomicBool::new(false));
        let failing = Arc::clone(&fail);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .ttl2(Duration::from_secs(10))
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                let fail = Arc::clone(&failing);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if fail.load(Ordering::SeqCst) {
                        return Err(std::io::Error::other("boom"));
                    }
                    Ok(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        user.call((1,)).await?;
        fail.store(true, Ordering::SeqCst);

        fx.clock.set(26);
        fx.tier1.evict("user:1");
        // The refresh attempt fails; the caller still gets the stale value
        // and tier1 is re-warmed with it.
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.tier1.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(5))));
        assert_eq!(fx.tier2.entry("user:1"), Some((b"25:user-1".to_vec(), Duration::from_secs(10))));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn a_full_miss_propagates_upstream_failures() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::<String>::text(), |(_user_id,): (u64,)| async move {
                Err::<Computed<String>, _>(std::io::Error::other("no fallback"))
            })?;

        assert!(matches!(user.call((1,)).await, Err(Error::Upstream(_))));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn put_peek_and_invalidate_operate_on_tier2() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let counter = Arc::clone(&fx.calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .ttl2(Duration::from_secs(10))
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        user.put(&"boo".to_owned(), &(1,)).await?;
        assert_eq!(fx.tier2.entry("user:1"), Some((b"25:boo".to_vec(), Duration::from_secs(10))));
        assert!(!fx.tier1.contains_key("user:1"));

        // The next read is served from tier2 without invoking the function.
        assert_eq!(user.call((1,)).await?, "boo");
        assert_eq!(user.peek(&(1,)).await?, Some("boo".to_owned()));
        assert_eq!(fx.calls.load(Ordering::SeqCst), 0);

        user.invalidate(&(1,)).await?;
        assert!(!fx.tier2.contains_key("user:1"));
        // Tier1 drains on its own TTL; the entry re-warmed above survives
        // the invalidation.
        assert!(fx.tier1.contains_key("user:1"));

        fx.tier1.evict("user:1");
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn tier2_lifetime_defaults_to_twice_tier1() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .build_with_codec(Codec::text(), |(user_id,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
            })?;

        user.call((1,)).await?;
        assert_eq!(fx.tier2.entry("user:1").map(|(_, ttl)| ttl), Some(Duration::from_secs(10)));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn tier2_shorter_than_tier1_is_rejected() {
    let fx = Fixture::new();
    let factory = fx.factory();
    let error = factory
        .wrap("user:{user_id}")
        .params(&["user_id"])
        .ttl1(Duration::from_secs(10))
        .ttl2(Duration::from_secs(5))
        .build_with_codec(Codec::text(), |(user_id,): (u64,)| async move {
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })
        .unwrap_err();
    assert!(matches!(error, Error::Configuration(_)));
}

#[test]
fn a_custom_ttl_moves_the_freshness_deadline() {
    block_on(async {
        let fx = Fixture::new();
        let factory = fx.factory();
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl1(Duration::from_secs(5))
            .ttl2(Duration::from_secs(200))
            .build_with_codec(Codec::text(), |(user_id,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::WithTtl(
                    format!("user-{user_id}"),
                    Duration::from_secs(100),
                ))
            })?;

        user.call((1,)).await?;
        // The override replaces ttl1 for the write: tier1 TTL and the
        // embedded deadline both track it, tier2's lifetime does not.
        assert_eq!(fx.tier1.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(100))));
        assert_eq!(fx.tier2.entry("user:1"), Some((b"120:user-1".to_vec(), Duration::from_secs(200))));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn malformed_tier2_entries_surface_as_errors() {
    block_on(async {
        use recall_store::CacheStore;

        let fx = Fixture::new();
        let factory = fx.factory();
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::<String>::text(), |(user_id,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
            })?;

        fx.tier2.set("user:1", b"no separator".to_vec(), Duration::from_secs(10)).await?;
        assert!(matches!(user.call((1,)).await, Err(Error::MalformedEntry(_))));
        Ok::<(), Error>(())
    })
    .unwrap();
}
