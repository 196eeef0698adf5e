// src/core/commands/mod.rs

//! Command descriptors: wire name, reply decoder and result convertor.

pub mod args;
pub mod builtin;

use crate::core::SpinelClientError;
use crate::core::protocol::RespValue;
use crate::core::types::Value;
use bytes::Bytes;
use std::borrow::Cow;

/// Turns a decoded reply into the command's typed result.
pub type Decoder<T> = fn(RespValue) -> Result<T, SpinelClientError>;

/// Optional post-processing applied to every decoded result.
pub type Convertor<T> = fn(T) -> T;

/// An immutable command descriptor.
///
/// A variant with a different wire name is constructed with [`with_name`],
/// reusing the decoder and convertor; the script cache uses this to rewrite
/// `EVAL` into `EVALSHA` without touching reply handling.
///
/// [`with_name`]: CommandSpec::with_name
#[derive(Debug)]
pub struct CommandSpec<T> {
    name: Cow<'static, str>,
    decoder: Decoder<T>,
    convertor: Option<Convertor<T>>,
}

impl<T> Clone for CommandSpec<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            decoder: self.decoder,
            convertor: self.convertor,
        }
    }
}

impl<T> CommandSpec<T> {
    pub const fn new(name: &'static str, decoder: Decoder<T>) -> Self {
        Self {
            name: Cow::Borrowed(name),
            decoder,
            convertor: None,
        }
    }

    pub const fn with_convertor(name: &'static str, decoder: Decoder<T>, c: Convertor<T>) -> Self {
        Self {
            name: Cow::Borrowed(name),
            decoder,
            convertor: Some(c),
        }
    }

    /// Builds a variant of this command under a different wire name.
    pub fn with_name(&self, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            decoder: self.decoder,
            convertor: self.convertor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decodes a reply and applies the convertor, if any.
    pub fn decode(&self, reply: RespValue) -> Result<T, SpinelClientError> {
        let value = (self.decoder)(reply)?;
        Ok(self.convert(value))
    }

    /// Applies only the convertor.
    pub fn convert(&self, value: T) -> T {
        match self.convertor {
            Some(c) => c(value),
            None => value,
        }
    }
}

// --- Stock reply decoders ---

/// Expects `+OK`.
pub fn decode_ok(reply: RespValue) -> Result<(), SpinelClientError> {
    match reply {
        RespValue::SimpleString(s) if s.eq_ignore_ascii_case("OK") => Ok(()),
        RespValue::Error(text) => Err(SpinelClientError::from_server_reply(&text)),
        other => Err(SpinelClientError::Internal(format!(
            "unexpected reply, wanted +OK: {other:?}"
        ))),
    }
}

/// A bulk string or null.
pub fn decode_bulk(reply: RespValue) -> Result<Option<Bytes>, SpinelClientError> {
    match reply {
        RespValue::BulkString(b) => Ok(Some(b)),
        RespValue::SimpleString(s) => Ok(Some(Bytes::copy_from_slice(s.as_bytes()))),
        RespValue::Null => Ok(None),
        RespValue::Error(text) => Err(SpinelClientError::from_server_reply(&text)),
        other => Err(SpinelClientError::Internal(format!(
            "unexpected reply, wanted a bulk string: {other:?}"
        ))),
    }
}

/// An integer reply.
pub fn decode_int(reply: RespValue) -> Result<i64, SpinelClientError> {
    match reply {
        RespValue::Integer(i) => Ok(i),
        RespValue::Error(text) => Err(SpinelClientError::from_server_reply(&text)),
        other => Err(SpinelClientError::Internal(format!(
            "unexpected reply, wanted an integer: {other:?}"
        ))),
    }
}

/// Any reply, mapped structurally into a [`Value`].
pub fn decode_value(reply: RespValue) -> Result<Value, SpinelClientError> {
    Ok(match reply {
        RespValue::SimpleString(s) => Value::Str(s),
        RespValue::BulkString(b) => Value::Bytes(b),
        RespValue::Integer(i) => Value::Int(i),
        RespValue::Array(items) => Value::List(
            items
                .into_iter()
                .map(decode_value)
                .collect::<Result<_, _>>()?,
        ),
        RespValue::Null => Value::Null,
        RespValue::Error(text) => return Err(SpinelClientError::from_server_reply(&text)),
    })
}

/// An array reply, element-decoded into values. Null counts as empty.
pub fn decode_array(reply: RespValue) -> Result<Vec<Value>, SpinelClientError> {
    match reply {
        RespValue::Array(items) => items.into_iter().map(decode_value).collect(),
        RespValue::Null => Ok(Vec::new()),
        RespValue::Error(text) => Err(SpinelClientError::from_server_reply(&text)),
        other => Err(SpinelClientError::Internal(format!(
            "unexpected reply, wanted an array: {other:?}"
        ))),
    }
}
