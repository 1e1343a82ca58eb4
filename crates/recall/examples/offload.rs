// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two-tier caching with a background refresh worker.

use std::convert::Infallible;
use std::time::Duration;

use recall::offload::{OffloadWorker, local_queue};
use recall::{Computed, Error, TieredCacheFactory};
use recall_memory::InMemoryStore;
use recall_store::Clock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let clock = Clock::system();
    let (queue, receiver) = local_queue();

    let factory = TieredCacheFactory::new(
        InMemoryStore::new(clock.clone()),
        InMemoryStore::new(clock.clone()),
    )
    .clock(clock)
    .offload(queue);

    let user = factory
        .wrap("user:{user_id}")
        .params(&["user_id"])
        .ttl1(Duration::from_secs(1))
        .ttl2(Duration::from_secs(60))
        .format("json")
        .build(|(user_id,): (u64,)| async move {
            println!("computing user {user_id}");
            Ok::<_, Infallible>(Computed::Plain(format!("user-{user_id}")))
        })?;

    // Drain refresh requests in the background.
    let worker = OffloadWorker::new(factory.registry(), receiver).spawn();

    println!("{}", user.call((7,)).await?);

    // After the freshness deadline, readers get the stale value immediately
    // while the worker recomputes.
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("{}", user.call((7,)).await?);
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("{}", user.call((7,)).await?);

    worker.abort();
    Ok(())
}
