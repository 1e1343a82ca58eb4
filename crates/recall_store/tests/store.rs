// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the `CacheStore` contract's default batched methods.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use recall_store::{CacheStore, Error};

/// A minimal store that only implements the required unary methods, so the
/// trait's default `mget`/`mset`/`mdelete` loops are what gets exercised.
#[derive(Debug, Default)]
struct UnaryOnlyStore(RwLock<HashMap<String, Vec<u8>>>);

impl CacheStore for UnaryOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.0.read().expect("lock poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<(), Error> {
        self.0.write().expect("lock poisoned").insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.0.write().expect("lock poisoned").remove(key);
        Ok(())
    }
}

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn default_mget_preserves_key_order() {
    block_on(async {
        let store = UnaryOnlyStore::default();
        store.set("one", b"1".to_vec(), Duration::from_secs(60)).await?;
        store.set("three", b"3".to_vec(), Duration::from_secs(60)).await?;

        let keys = vec!["one".to_owned(), "two".to_owned(), "three".to_owned()];
        let values = store.mget(&keys).await?;

        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn default_mset_writes_every_pair() {
    block_on(async {
        let store = UnaryOnlyStore::default();
        store
            .mset(
                vec![("a".to_owned(), b"1".to_vec()), ("b".to_owned(), b"2".to_vec())],
                Duration::from_secs(60),
            )
            .await?;

        assert_eq!(store.get("a").await?, Some(b"1".to_vec()));
        assert_eq!(store.get("b").await?, Some(b"2".to_vec()));
        Ok::<(), Error>(())
    })
    .unwrap();
}

#[test]
fn default_mdelete_removes_every_key() {
    block_on(async {
        let store = UnaryOnlyStore::default();
        store.set("a", b"1".to_vec(), Duration::from_secs(60)).await?;
        store.set("b", b"2".to_vec(), Duration::from_secs(60)).await?;

        store.mdelete(&["a".to_owned(), "b".to_owned()]).await?;

        assert_eq!(store.get("a").await?, None);
        assert_eq!(store.get("b").await?, None);
        Ok::<(), Error>(())
    })
    .unwrap();
}
