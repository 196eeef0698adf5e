// src/core/protocol/mod.rs

//! Defines the decoded reply value handed to the dispatch core.

use bytes::Bytes;

/// `RespValue` is the decoded form of a single server reply.
///
/// The dispatch core never touches raw wire frames; the connection layer
/// below the [`NodeConnection`](crate::core::conn::NodeConnection) trait
/// decodes them into this shape. Command reply decoders then turn a
/// `RespValue` into a typed result.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    BulkString(Bytes),
    Integer(i64),
    Array(Vec<RespValue>),
    Null,
    Error(String),
}

impl RespValue {
    /// Returns the error text if this reply is a server-reported error.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            RespValue::Error(text) => Some(text),
            _ => None,
        }
    }
}
