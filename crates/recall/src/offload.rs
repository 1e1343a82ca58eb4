// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deferred refresh: messages, transports, and the dispatch registry.
//!
//! When a two-tier wrapper in offload mode serves a stale value, it enqueues
//! an [`OffloadMessage`] describing the recomputation instead of blocking the
//! reader. A worker (possibly in another process) later routes the message
//! through an [`OffloadRegistry`] back to the wrapper that produced it, which
//! re-runs the wrapped function and rewrites both tiers.
//!
//! The transport is a collaborator: anything that can carry a serialized
//! message works. [`local_queue`] provides the in-process tokio channel, and
//! [`OffloadWorker`] the matching drain loop.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// A deferred-refresh request.
///
/// `args` (and `ids`, for the batch variant) carry the original call
/// arguments as JSON so the message can cross process boundaries; the
/// receiving wrapper re-derives its typed arguments from them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OffloadMessage {
    /// Identity of the wrapper that must handle this message.
    pub cache_id: String,
    /// The cache key(s) the stale read observed.
    pub keys: Vec<String>,
    /// The call's rest arguments, JSON-encoded.
    pub args: serde_json::Value,
    /// The stale ids (batch variant only), JSON-encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<serde_json::Value>,
    /// True for the batch (objects) variant.
    #[serde(default)]
    pub multi: bool,
}

impl OffloadMessage {
    pub(crate) fn single<A: Serialize>(cache_id: &str, key: &str, args: &A) -> Result<Self> {
        Ok(Self {
            cache_id: cache_id.to_owned(),
            keys: vec![key.to_owned()],
            args: serde_json::to_value(args).map_err(|cause| Error::Offload(cause.to_string()))?,
            ids: None,
            multi: false,
        })
    }

    pub(crate) fn batch<I: Serialize, A: Serialize>(
        cache_id: &str,
        keys: Vec<String>,
        ids: &[I],
        args: &A,
    ) -> Result<Self> {
        Ok(Self {
            cache_id: cache_id.to_owned(),
            keys,
            args: serde_json::to_value(args).map_err(|cause| Error::Offload(cause.to_string()))?,
            ids: Some(serde_json::to_value(ids).map_err(|cause| Error::Offload(cause.to_string()))?),
            multi: true,
        })
    }
}

/// A transport that accepts refresh messages without blocking the caller.
///
/// `enqueue` may fail; the wrappers log and drop the message in that case, so
/// a transport failure never reaches the reader that observed the stale
/// value. A dropped message is recovered by tier2's own TTL: once the entry
/// expires completely, the next read recomputes synchronously.
pub trait OffloadQueue: Send + Sync {
    /// Accepts a message for later dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Offload`] when the transport cannot accept the message.
    fn enqueue(&self, message: OffloadMessage) -> Result<()>;
}

/// The receiving end of an offload dispatch: a wrapper that can re-run its
/// computation from a message.
pub trait OffloadTarget: Send + Sync {
    /// Executes the refresh the message describes.
    ///
    /// Failures are logged, never returned: there is no caller waiting.
    fn handle(&self, message: OffloadMessage) -> BoxFuture<'_, ()>;
}

/// Routes refresh messages to the wrapper that registered under their
/// `cache_id`.
///
/// The registry is an explicit object owned by the tiered factory, passed by
/// reference to whatever drains the transport. Wrappers register at
/// decoration time and are never removed.
#[derive(Default)]
pub struct OffloadRegistry {
    targets: RwLock<HashMap<String, Arc<dyn OffloadTarget>>>,
}

impl std::fmt::Debug for OffloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffloadRegistry")
            .field("cache_ids", &self.targets.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OffloadRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target` under `cache_id`, replacing any previous
    /// registration (with a warning, since that usually means two wrappers
    /// share an identity).
    pub fn register(&self, cache_id: impl Into<String>, target: Arc<dyn OffloadTarget>) {
        let cache_id = cache_id.into();
        if self.targets.write().insert(cache_id.clone(), target).is_some() {
            tracing::warn!(cache_id = %cache_id, "replacing existing offload registration");
        }
    }

    /// Returns true if a wrapper is registered under `cache_id`.
    #[must_use]
    pub fn contains(&self, cache_id: &str) -> bool {
        self.targets.read().contains_key(cache_id)
    }

    /// Dispatches a message to its registered wrapper.
    ///
    /// Returns false (and logs) when no wrapper is registered under the
    /// message's `cache_id`.
    pub async fn dispatch(&self, message: OffloadMessage) -> bool {
        let target = self.targets.read().get(&message.cache_id).map(Arc::clone);
        match target {
            Some(target) => {
                target.handle(message).await;
                true
            }
            None => {
                tracing::error!(cache_id = %message.cache_id, "no cache registered for offload message");
                false
            }
        }
    }
}

/// The in-process offload transport: an unbounded tokio channel.
///
/// Returns the sending half (to hand to
/// [`TieredCacheFactory::offload`](crate::builder::TieredCacheFactory::offload))
/// and the receiving half (to drive directly or via [`OffloadWorker`]).
#[must_use]
pub fn local_queue() -> (LocalQueue, LocalReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (LocalQueue { sender }, LocalReceiver { receiver })
}

/// Sending half of the in-process offload channel.
#[derive(Debug, Clone)]
pub struct LocalQueue {
    sender: mpsc::UnboundedSender<OffloadMessage>,
}

impl OffloadQueue for LocalQueue {
    fn enqueue(&self, message: OffloadMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| Error::Offload("offload channel closed".to_owned()))
    }
}

/// Receiving half of the in-process offload channel.
#[derive(Debug)]
pub struct LocalReceiver {
    receiver: mpsc::UnboundedReceiver<OffloadMessage>,
}

impl LocalReceiver {
    /// Receives the next message, or `None` once all senders are dropped.
    pub async fn recv(&mut self) -> Option<OffloadMessage> {
        self.receiver.recv().await
    }

    /// Receives the next message if one is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<OffloadMessage> {
        self.receiver.try_recv().ok()
    }
}

/// A drain loop connecting a [`LocalReceiver`] to an [`OffloadRegistry`].
#[derive(Debug)]
pub struct OffloadWorker {
    registry: Arc<OffloadRegistry>,
    receiver: LocalReceiver,
}

impl OffloadWorker {
    /// Creates a worker that dispatches received messages through `registry`.
    #[must_use]
    pub fn new(registry: Arc<OffloadRegistry>, receiver: LocalReceiver) -> Self {
        Self { registry, receiver }
    }

    /// Drains the channel until all senders are dropped.
    pub async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            self.registry.dispatch(message).await;
        }
    }

    /// Spawns [`run`](Self::run) onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
