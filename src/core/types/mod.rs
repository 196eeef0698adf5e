// src/core/types/mod.rs

//! User-facing value model and the injected codec / callback seams.

use crate::core::SpinelClientError;
use crate::core::commands::CommandSpec;
use crate::core::protocol::RespValue;
use bytes::Bytes;

/// A user value as the dispatch layer sees it.
///
/// The typed facades above this crate reduce their inputs to `Value`s; the
/// injected [`Codec`] turns a `Value` into wire bytes and back. The dispatch
/// core itself never inspects encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bytes(Bytes),
    Str(String),
    Int(i64),
    Double(f64),
    List(Vec<Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Serialization seam supplied by the caller.
///
/// Three distinct encoders are required because map keys, map values and
/// plain values may use different representations (e.g. a hash field name is
/// always a short string while the value may be a serialized object).
pub trait Codec: Send + Sync {
    fn encode_value(&self, value: &Value) -> Result<Bytes, SpinelClientError>;
    fn encode_map_key(&self, value: &Value) -> Result<Bytes, SpinelClientError>;
    fn encode_map_value(&self, value: &Value) -> Result<Bytes, SpinelClientError>;
    fn decode_value(&self, reply: &RespValue) -> Result<Value, SpinelClientError>;
}

/// The stock codec: UTF-8 strings and raw bytes pass through, numbers are
/// rendered in their decimal form.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringCodec;

impl StringCodec {
    fn encode(&self, value: &Value) -> Result<Bytes, SpinelClientError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Str(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Value::Int(i) => {
                let mut buf = itoa::Buffer::new();
                Ok(Bytes::copy_from_slice(buf.format(*i).as_bytes()))
            }
            Value::Double(d) => Ok(Bytes::copy_from_slice(d.to_string().as_bytes())),
            Value::Null => Err(SpinelClientError::InvalidArgument(
                "cannot encode a null value".to_string(),
            )),
            Value::List(_) => Err(SpinelClientError::InvalidArgument(
                "cannot encode a list as a single argument".to_string(),
            )),
        }
    }
}

impl Codec for StringCodec {
    fn encode_value(&self, value: &Value) -> Result<Bytes, SpinelClientError> {
        self.encode(value)
    }

    fn encode_map_key(&self, value: &Value) -> Result<Bytes, SpinelClientError> {
        self.encode(value)
    }

    fn encode_map_value(&self, value: &Value) -> Result<Bytes, SpinelClientError> {
        self.encode(value)
    }

    fn decode_value(&self, reply: &RespValue) -> Result<Value, SpinelClientError> {
        Ok(match reply {
            RespValue::SimpleString(s) => Value::Str(s.clone()),
            RespValue::BulkString(b) => Value::Bytes(b.clone()),
            RespValue::Integer(i) => Value::Int(*i),
            RespValue::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.decode_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            RespValue::Null => Value::Null,
            RespValue::Error(text) => return Err(SpinelClientError::from_server_reply(text)),
        })
    }
}

/// Optional hook that replaces a user object with a persistent reference
/// before encoding. Returning `None` leaves the value untouched.
pub trait ReferenceBuilder: Send + Sync {
    fn to_reference(&self, value: &Value) -> Option<Value>;
}

/// Caller-supplied reducer over per-node or per-slot partial results.
///
/// `on_slot_result` is always invoked under a dispatcher-held lock, so
/// implementations may accumulate into plain interior-mutable state without
/// their own synchronization (but must tolerate arbitrary ordering of
/// distinct nodes).
pub trait SlotCallback<T, R>: Send + Sync {
    /// Optional per-group command override for cross-slot batching.
    fn create_command(&self, _keys: &[Bytes]) -> Option<CommandSpec<T>> {
        None
    }

    /// Builds the per-group argument list from the grouped keys.
    fn create_params(&self, keys: &[Bytes]) -> Vec<Value>;

    /// Receives one group's (or node's) decoded result.
    fn on_slot_result(&self, value: T);

    /// Produces the aggregate once every group has terminated.
    fn on_finish(&self) -> R;
}
