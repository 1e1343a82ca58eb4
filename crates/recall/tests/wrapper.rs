// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the single-key cache wrapper.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use recall::serializer::Codec;
use recall::{CacheFactory, Computed, Error};
use recall_store::CacheStore;
use recall_store::testing::{MockStore, StoreOp};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

/// A wrapper over a counting `user-{id}` function with the text codec, so
/// stored bytes are directly assertable.
fn counting_factory() -> (MockStore, Arc<AtomicUsize>, CacheFactory<MockStore>) {
    let store = MockStore::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = CacheFactory::new(store.clone()).fuzzy_ttl(false);
    (store, calls, factory)
}

#[test]
fn call_invokes_the_function_exactly_once() {
    block_on(async {
        let (store, calls, factory) = counting_factory();
        let counter = Arc::clone(&calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl(Duration::from_secs(5))
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(5))));

        // A different key misses independently.
        assert_eq!(user.call((2,)).await?, "user-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn invalidate_causes_a_recompute() {
    block_on(async {
        let (_store, calls, factory) = counting_factory();
        let counter = Arc::clone(&calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        user.call((1,)).await?;
        user.invalidate(&(1,)).await?;
        user.call((1,)).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn custom_ttl_overrides_the_configured_ttl_for_one_write() {
    block_on(async {
        let store = MockStore::new();
        let factory = CacheFactory::new(store.clone()).fuzzy_ttl(false);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .ttl(Duration::from_secs(42))
            .build_with_codec(Codec::text(), |(user_id,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::WithTtl(format!("user-{user_id}"), Duration::from_secs(100)))
            })?;

        assert_eq!(user.call((1,)).await?, "user-1");
        assert_eq!(store.entry("user:1"), Some((b"user-1".to_vec(), Duration::from_secs(100))));

        // Explicit writes always use the configured TTL, never an override.
        user.put(&"boo".to_owned(), &(1,)).await?;
        assert_eq!(store.entry("user:1"), Some((b"boo".to_vec(), Duration::from_secs(42))));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn peek_never_invokes_the_function() {
    block_on(async {
        let (store, calls, factory) = counting_factory();
        let counter = Arc::clone(&calls);
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::text(), move |(user_id,): (u64,)| {
                let calls = Arc::clone(&counter);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                }
            })?;

        assert_eq!(user.peek(&(1,)).await?, None);
        user.call((1,)).await?;
        assert_eq!(user.peek(&(1,)).await?, Some("user-1".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // An empty stored payload is a miss, not an empty value.
        store.set("user:2", Vec::new(), Duration::from_secs(5)).await?;
        assert_eq!(user.peek(&(2,)).await?, None);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn upstream_failure_propagates_on_a_miss() {
    block_on(async {
        let store = MockStore::new();
        let factory = CacheFactory::new(store);
        let failing = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::<String>::text(), |(_user_id,): (u64,)| async move {
                Err::<Computed<String>, _>(std::io::Error::other("backend down"))
            })?;

        let error = failing.call((1,)).await.unwrap_err();
        assert!(matches!(error, Error::Upstream(_)));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn unknown_format_fails_at_decoration_time() {
    let factory = CacheFactory::new(MockStore::new());
    let error = factory
        .wrap("user:{user_id}")
        .params(&["user_id"])
        .format("msgpack")
        .build(|(user_id,): (u64,)| async move {
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })
        .unwrap_err();

    assert!(matches!(&error, Error::UnknownFormat(name) if name == "msgpack"));
}

#[test]
fn arity_mismatch_fails_at_decoration_time() {
    let factory = CacheFactory::new(MockStore::new());
    let error = factory
        .wrap("user:{user_id}")
        .params(&["user_id", "lang"])
        .build(|(user_id,): (u64,)| async move {
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })
        .unwrap_err();

    assert!(matches!(error, Error::Configuration(_)));
}

#[test]
fn unknown_template_field_fails_at_decoration_time() {
    let factory = CacheFactory::new(MockStore::new());
    let error = factory
        .wrap("user:{nope}")
        .params(&["user_id"])
        .build(|(user_id,): (u64,)| async move {
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains("nope"), "{message}");
    assert!(message.contains("user_id"), "{message}");
}

#[test]
fn custom_key_function_is_used_verbatim() {
    block_on(async {
        let store = MockStore::new();
        let factory = CacheFactory::new(store.clone()).fuzzy_ttl(false);
        let user = factory
            .wrap("ignored")
            .format("json")
            .build_with_key(
                |(user_id,): &(u64,)| format!("custom/{user_id}"),
                |(user_id,): (u64,)| async move {
                    Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
                },
            )?;

        user.call((9,)).await?;
        assert!(store.contains_key("custom/9"));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn exact_ttl_when_fuzz_is_disabled_and_jitter_when_enabled() {
    block_on(async {
        let store = MockStore::new();
        let factory = CacheFactory::new(store.clone());

        let exact = factory
            .wrap("exact:{n}")
            .params(&["n"])
            .ttl(Duration::from_secs(600))
            .fuzzy_ttl(false)
            .build_with_codec(Codec::text(), |(n,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::Plain(n.to_string()))
            })?;
        exact.call((1,)).await?;
        assert_eq!(store.entry("exact:1").map(|(_, ttl)| ttl), Some(Duration::from_secs(600)));

        let fuzzed = factory
            .wrap("fuzzy:{n}")
            .params(&["n"])
            .ttl(Duration::from_secs(600))
            .fuzzy_ttl(true)
            .build_with_codec(Codec::text(), |(n,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::Plain(n.to_string()))
            })?;
        fuzzed.call((1,)).await?;
        let ttl = store.entry("fuzzy:1").map(|(_, ttl)| ttl.as_secs()).unwrap();
        assert!((540..=660).contains(&ttl), "jittered ttl {ttl} outside [540, 660]");

        // The effective TTL is sampled once per decoration, so a second key
        // through the same wrapper shares it.
        fuzzed.call((2,)).await?;
        assert_eq!(store.entry("fuzzy:2").map(|(_, ttl)| ttl.as_secs()), Some(ttl));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn store_operations_stay_minimal_on_a_hit() {
    block_on(async {
        let (store, _calls, factory) = counting_factory();
        let user = factory
            .wrap("user:{user_id}")
            .params(&["user_id"])
            .build_with_codec(Codec::text(), |(user_id,): (u64,)| async move {
                Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
            })?;

        user.call((1,)).await?;
        store.clear_operations();

        user.call((1,)).await?;
        assert_eq!(store.operations(), vec![StoreOp::Get("user:1".to_owned())]);
        Ok::<(), Error>(())
    })
    .unwrap();
}
