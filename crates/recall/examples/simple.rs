// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoizing a single-value function behind an in-memory store.

use std::convert::Infallible;
use std::time::Duration;

use recall::{CacheFactory, Computed, Error};
use recall_memory::InMemoryStore;
use recall_store::Clock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let factory = CacheFactory::new(InMemoryStore::new(Clock::system()));

    let user_name = factory
        .wrap("user:{user_id}")
        .params(&["user_id"])
        .ttl(Duration::from_secs(300))
        .format("json")
        .build(|(user_id,): (u64,)| async move {
            println!("computing user {user_id}");
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })?;

    // Computed once, then served from the store.
    println!("{}", user_name.call((7,)).await?);
    println!("{}", user_name.call((7,)).await?);

    user_name.invalidate(&(7,)).await?;
    println!("{}", user_name.call((7,)).await?);

    Ok(())
}
