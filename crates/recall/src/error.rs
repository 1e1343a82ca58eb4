// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache wrapper operations.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error from building or calling a cache wrapper.
///
/// Configuration problems (bad key templates, unknown serializer names,
/// arity mismatches) surface when a wrapper is built, before any call is
/// made. Store errors pass through unchanged; failures of the wrapped
/// function surface as [`Error::Upstream`] only on paths where no cached
/// value can be served instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The wrapper was configured incorrectly at build time.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// A serializer format name did not resolve to a registered codec.
    #[error("unknown serializer format: {0:?}")]
    UnknownFormat(String),

    /// Encoding a value for storage failed.
    #[error("failed to encode cache value as {format:?}")]
    Encode {
        /// Name of the codec that failed.
        format: String,
        /// The underlying codec error.
        #[source]
        source: BoxError,
    },

    /// Decoding a stored payload failed.
    #[error("failed to decode cached value as {format:?}")]
    Decode {
        /// Name of the codec that failed.
        format: String,
        /// The underlying codec error.
        #[source]
        source: BoxError,
    },

    /// A tier2 payload did not carry a valid embedded expiry envelope.
    #[error("malformed authoritative cache entry: {0}")]
    MalformedEntry(String),

    /// A cache store operation failed.
    #[error(transparent)]
    Store(#[from] recall_store::Error),

    /// The wrapped function failed while computing a value and no cached
    /// value was available to serve instead.
    #[error("recomputing the cached value failed")]
    Upstream(#[source] BoxError),

    /// An offload transport rejected a refresh message.
    #[error("offload transport failed: {0}")]
    Offload(String),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wraps a wrapped-function failure.
    pub fn upstream(cause: impl Into<BoxError>) -> Self {
        Self::Upstream(cause.into())
    }
}

/// A specialized [`Result`] type for cache wrapper operations.
pub type Result<T> = std::result::Result<T, Error>;
