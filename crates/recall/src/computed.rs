// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The result type wrapped functions return to the cache.

use std::time::Duration;

/// A value produced by a wrapped function, with an optional TTL override.
///
/// Most functions return [`Computed::Plain`] (or rely on the `From`
/// conversion) and the wrapper caches the value with its configured TTL.
/// Returning [`Computed::WithTtl`] overrides the TTL for that one cache
/// write; the override is consumed immediately by the wrapper and never
/// stored.
///
/// # Examples
///
/// ```
/// use recall::Computed;
/// use std::time::Duration;
///
/// // These two are equivalent:
/// let plain: Computed<&str> = Computed::Plain("value");
/// let converted: Computed<&str> = "value".into();
/// assert_eq!(plain, converted);
///
/// // Cache this particular result for 100 seconds, whatever the wrapper's TTL.
/// let pinned = Computed::WithTtl("value", Duration::from_secs(100));
/// assert_eq!(pinned.ttl(), Some(Duration::from_secs(100)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Computed<V> {
    /// A value cached with the wrapper's configured TTL.
    Plain(V),
    /// A value cached with a custom TTL for this specific write.
    WithTtl(V, Duration),
}

impl<V> Computed<V> {
    /// Returns a reference to the computed value.
    pub fn value(&self) -> &V {
        match self {
            Self::Plain(value) | Self::WithTtl(value, _) => value,
        }
    }

    /// Returns the TTL override, if any.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Plain(_) => None,
            Self::WithTtl(_, ttl) => Some(*ttl),
        }
    }

    /// Consumes the result, returning the value and the TTL override.
    pub fn into_parts(self) -> (V, Option<Duration>) {
        match self {
            Self::Plain(value) => (value, None),
            Self::WithTtl(value, ttl) => (value, Some(ttl)),
        }
    }
}

impl<V> From<V> for Computed<V> {
    fn from(value: V) -> Self {
        Self::Plain(value)
    }
}
