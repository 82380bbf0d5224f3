//! Conversion between application values and wire bodies.
//!
//! A [`Codec`] is the explicit value-type witness handed to a
//! [`Sender`](crate::Sender) or [`Receiver`](crate::Receiver) at construction.
//! The channel never guesses a value type; it only calls `encode` and `decode`
//! and propagates their errors unchanged.

use crate::error::SerializationError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Display};
use std::marker::PhantomData;
use std::str::FromStr;

/// Two-way conversion between a value type and a wire string
pub trait Codec: Send + Sync {
    /// Application value carried by a message
    type Value;

    /// Convert a value into a wire body
    fn encode(&self, value: &Self::Value) -> Result<String, SerializationError>;

    /// Convert a wire body back into a value
    fn decode(&self, body: &str) -> Result<Self::Value, SerializationError>;
}

/// Identity codec for plain string messages
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn encode(&self, value: &String) -> Result<String, SerializationError> {
        Ok(value.clone())
    }

    fn decode(&self, body: &str) -> Result<String, SerializationError> {
        Ok(body.to_string())
    }
}

/// Codec for types with a textual form, such as numbers
///
/// Encodes with [`Display`] and decodes with [`FromStr`].
pub struct FromStrCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> FromStrCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for FromStrCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FromStrCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FromStrCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FromStrCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T> Codec for FromStrCodec<T>
where
    T: Display + FromStr,
    T::Err: Display,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<String, SerializationError> {
        Ok(value.to_string())
    }

    fn decode(&self, body: &str) -> Result<T, SerializationError> {
        body.parse::<T>().map_err(|e| SerializationError::Parse {
            type_name: std::any::type_name::<T>(),
            input: body.to_string(),
            message: e.to_string(),
        })
    }
}

/// Codec storing values as JSON documents
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, body: &str) -> Result<T, SerializationError> {
        Ok(serde_json::from_str(body)?)
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
