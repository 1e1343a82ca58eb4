// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serialization codecs and the name-to-codec registry.
//!
//! A [`Codec`] is an injected pair of encode/decode functions between a value
//! type and the byte payloads a store holds. The built-in formats are `"bin"`
//! (bincode, the default wire format), `"json"` (serde_json), and `"text"`
//! (a `Display`/`FromStr` passthrough). Resolution of a format name happens
//! when a wrapper is built; an unknown name is an
//! [`UnknownFormat`](crate::Error::UnknownFormat) error before any call is
//! made.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

type EncodeFn<V> = Arc<dyn Fn(&V) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn<V> = Arc<dyn Fn(&[u8]) -> Result<V> + Send + Sync>;

/// An encode/decode pair between values of type `V` and stored bytes.
///
/// # Examples
///
/// ```
/// use recall::serializer::Codec;
///
/// let codec = Codec::<String>::json();
/// let bytes = codec.encode(&"hello".to_owned())?;
/// assert_eq!(codec.decode(&bytes)?, "hello");
/// # Ok::<(), recall::Error>(())
/// ```
pub struct Codec<V> {
    name: String,
    encode: EncodeFn<V>,
    decode: DecodeFn<V>,
}

impl<V> Clone for Codec<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<V> std::fmt::Debug for Codec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<V> Codec<V> {
    /// Creates a codec from arbitrary encode/decode closures.
    ///
    /// The name is used in error messages and registry registration.
    pub fn custom(
        name: impl Into<String>,
        encode: impl Fn(&V) -> Result<Vec<u8>> + Send + Sync + 'static,
        decode: impl Fn(&[u8]) -> Result<V> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Returns the codec's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encodes a value into stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the underlying format rejects the value.
    pub fn encode(&self, value: &V) -> Result<Vec<u8>> {
        (self.encode)(value)
    }

    /// Decodes stored bytes back into a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the payload is not valid for the format.
    pub fn decode(&self, bytes: &[u8]) -> Result<V> {
        (self.decode)(bytes)
    }
}

impl<V> Codec<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    /// The JSON codec, for payloads that should stay human-readable.
    #[must_use]
    pub fn json() -> Self {
        Self::custom(
            "json",
            |value: &V| {
                serde_json::to_vec(value).map_err(|cause| Error::Encode {
                    format: "json".to_owned(),
                    source: cause.into(),
                })
            },
            |bytes: &[u8]| {
                serde_json::from_slice(bytes).map_err(|cause| Error::Decode {
                    format: "json".to_owned(),
                    source: cause.into(),
                })
            },
        )
    }

    /// The compact structured binary codec, the default wire format.
    #[must_use]
    pub fn bin() -> Self {
        Self::custom(
            "bin",
            |value: &V| {
                bincode::serialize(value).map_err(|cause| Error::Encode {
                    format: "bin".to_owned(),
                    source: cause.into(),
                })
            },
            |bytes: &[u8]| {
                bincode::deserialize(bytes).map_err(|cause| Error::Decode {
                    format: "bin".to_owned(),
                    source: cause.into(),
                })
            },
        )
    }
}

impl<V> Codec<V>
where
    V: Display + FromStr + 'static,
    <V as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    /// The textual passthrough codec: `Display` out, `FromStr` back.
    #[must_use]
    pub fn text() -> Self {
        Self::custom(
            "text",
            |value: &V| Ok(value.to_string().into_bytes()),
            |bytes: &[u8]| {
                let text = std::str::from_utf8(bytes).map_err(|cause| Error::Decode {
                    format: "text".to_owned(),
                    source: cause.into(),
                })?;
                text.parse().map_err(|cause: <V as FromStr>::Err| Error::Decode {
                    format: "text".to_owned(),
                    source: cause.into(),
                })
            },
        )
    }
}

/// A registry of named codecs for one value type.
///
/// # Examples
///
/// ```
/// use recall::serializer::{Codec, Serializers};
///
/// let mut formats = Serializers::<String>::with_builtins().with_text();
/// assert!(formats.resolve("json").is_ok());
/// assert!(formats.resolve("text").is_ok());
/// assert!(formats.resolve("msgpack").is_err());
///
/// formats.register("upper", Codec::custom(
///     "upper",
///     |value: &String| Ok(value.to_uppercase().into_bytes()),
///     |bytes| Ok(String::from_utf8_lossy(bytes).to_lowercase()),
/// ));
/// assert!(formats.resolve("upper").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Serializers<V> {
    formats: HashMap<String, Codec<V>>,
}

impl<V> Serializers<V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { formats: HashMap::new() }
    }

    /// Registers a codec under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, codec: Codec<V>) {
        self.formats.insert(name.into(), codec);
    }

    /// Resolves a format name to its codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFormat`] naming the attempted format.
    pub fn resolve(&self, name: &str) -> Result<Codec<V>> {
        self.formats
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFormat(name.to_owned()))
    }
}

impl<V> Default for Serializers<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Serializers<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    /// Creates a registry with the `"json"` and `"bin"` built-ins.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("json", Codec::json());
        registry.register("bin", Codec::bin());
        registry
    }
}

impl<V> Serializers<V>
where
    V: Display + FromStr + 'static,
    <V as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    /// Adds the `"text"` passthrough codec.
    #[must_use]
    pub fn with_text(mut self) -> Self {
        self.register("text", Codec::text());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips() {
        let codec = Codec::<Vec<u32>>::json();
        let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bin_round_trips() {
        let codec = Codec::<(String, u64)>::bin();
        let bytes = codec.encode(&("x".to_owned(), 9)).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), ("x".to_owned(), 9));
    }

    #[test]
    fn text_is_a_passthrough() {
        let codec = Codec::<String>::text();
        assert_eq!(codec.encode(&"plain".to_owned()).unwrap(), b"plain");
        assert_eq!(codec.decode(b"plain").unwrap(), "plain");
    }

    #[test]
    fn decode_failure_names_the_format() {
        let codec = Codec::<u32>::json();
        let error = codec.decode(b"not-json").unwrap_err();
        assert!(error.to_string().contains("json"));
    }

    #[test]
    fn unknown_format_fails_resolution() {
        let registry = Serializers::<String>::with_builtins();
        let error = registry.resolve("msgpack").unwrap_err();
        assert!(matches!(error, Error::UnknownFormat(name) if name == "msgpack"));
    }
}
