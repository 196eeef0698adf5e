// src/core/errors.rs

//! Defines the primary error type for the client.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the dispatch core can
/// surface to a caller.
///
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations. The enum is cheaply cloneable so a single failure
/// can complete several pending observers.
#[derive(Error, Debug)]
pub enum SpinelClientError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Command timed out")]
    AttemptTimeout,

    #[error(
        "Command still hasn't been processed after {attempts} retry attempts; last cause: {cause}"
    )]
    RetriesExhausted {
        attempts: u32,
        cause: Box<SpinelClientError>,
    },

    #[error(
        "Subscription acquisition timed out: {0}. \
         Increase 'subscription_pool_size' or 'timeout' in the client configuration"
    )]
    SubscribeTimeout(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Command not allowed in the current state: {0}")]
    InvalidState(String),

    #[error("Internal Client Error: {0}")]
    Internal(String),

    // --- Server-reported errors ---
    #[error("{0}")]
    ServerError(String),

    #[error("NOSCRIPT {0}")]
    NoScript(String),

    #[error("TRYAGAIN {0}")]
    TryAgain(String),

    #[error("CROSSSLOT Keys in request don't hash to the same slot")]
    CrossSlot,

    // --- Cluster redirections ---
    /// A redirect indicating that a slot has permanently moved to another node.
    #[error("MOVED {slot} {addr}")]
    Moved { slot: u16, addr: String },

    /// A temporary redirect for a slot that is currently being migrated.
    #[error("ASK {slot} {addr}")]
    Ask { slot: u16, addr: String },
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for SpinelClientError {
    fn clone(&self) -> Self {
        match self {
            SpinelClientError::Io(e) => SpinelClientError::Io(Arc::clone(e)),
            SpinelClientError::Connection(s) => SpinelClientError::Connection(s.clone()),
            SpinelClientError::InvalidArgument(s) => SpinelClientError::InvalidArgument(s.clone()),
            SpinelClientError::AttemptTimeout => SpinelClientError::AttemptTimeout,
            SpinelClientError::RetriesExhausted { attempts, cause } => {
                SpinelClientError::RetriesExhausted {
                    attempts: *attempts,
                    cause: cause.clone(),
                }
            }
            SpinelClientError::SubscribeTimeout(s) => {
                SpinelClientError::SubscribeTimeout(s.clone())
            }
            SpinelClientError::Cancelled => SpinelClientError::Cancelled,
            SpinelClientError::InvalidState(s) => SpinelClientError::InvalidState(s.clone()),
            SpinelClientError::Internal(s) => SpinelClientError::Internal(s.clone()),
            SpinelClientError::ServerError(s) => SpinelClientError::ServerError(s.clone()),
            SpinelClientError::NoScript(s) => SpinelClientError::NoScript(s.clone()),
            SpinelClientError::TryAgain(s) => SpinelClientError::TryAgain(s.clone()),
            SpinelClientError::CrossSlot => SpinelClientError::CrossSlot,
            SpinelClientError::Moved { slot, addr } => SpinelClientError::Moved {
                slot: *slot,
                addr: addr.clone(),
            },
            SpinelClientError::Ask { slot, addr } => SpinelClientError::Ask {
                slot: *slot,
                addr: addr.clone(),
            },
        }
    }
}

impl PartialEq for SpinelClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SpinelClientError::Io(e1), SpinelClientError::Io(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (SpinelClientError::Connection(s1), SpinelClientError::Connection(s2)) => s1 == s2,
            (SpinelClientError::InvalidArgument(s1), SpinelClientError::InvalidArgument(s2)) => {
                s1 == s2
            }
            (SpinelClientError::InvalidState(s1), SpinelClientError::InvalidState(s2)) => s1 == s2,
            (SpinelClientError::Internal(s1), SpinelClientError::Internal(s2)) => s1 == s2,
            (SpinelClientError::ServerError(s1), SpinelClientError::ServerError(s2)) => s1 == s2,
            (SpinelClientError::NoScript(s1), SpinelClientError::NoScript(s2)) => s1 == s2,
            (SpinelClientError::TryAgain(s1), SpinelClientError::TryAgain(s2)) => s1 == s2,
            (SpinelClientError::SubscribeTimeout(s1), SpinelClientError::SubscribeTimeout(s2)) => {
                s1 == s2
            }
            (
                SpinelClientError::RetriesExhausted {
                    attempts: a1,
                    cause: c1,
                },
                SpinelClientError::RetriesExhausted {
                    attempts: a2,
                    cause: c2,
                },
            ) => a1 == a2 && c1 == c2,
            (
                SpinelClientError::Moved { slot: s1, addr: a1 },
                SpinelClientError::Moved { slot: s2, addr: a2 },
            ) => s1 == s2 && a1 == a2,
            (
                SpinelClientError::Ask { slot: s1, addr: a1 },
                SpinelClientError::Ask { slot: s2, addr: a2 },
            ) => s1 == s2 && a1 == a2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl SpinelClientError {
    /// Parses a server-reported error line into its structured form.
    ///
    /// Redirections and a handful of well-known prefixes get dedicated
    /// variants; everything else is surfaced verbatim as `ServerError`.
    pub fn from_server_reply(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix("MOVED ")
            && let Some((slot, addr)) = parse_redirect(rest)
        {
            return SpinelClientError::Moved { slot, addr };
        }
        if let Some(rest) = text.strip_prefix("ASK ")
            && let Some((slot, addr)) = parse_redirect(rest)
        {
            return SpinelClientError::Ask { slot, addr };
        }
        if let Some(rest) = text.strip_prefix("NOSCRIPT") {
            return SpinelClientError::NoScript(rest.trim_start().to_string());
        }
        if let Some(rest) = text.strip_prefix("TRYAGAIN") {
            return SpinelClientError::TryAgain(rest.trim_start().to_string());
        }
        if text.starts_with("LOADING") {
            return SpinelClientError::TryAgain(text.to_string());
        }
        if text.starts_with("CROSSSLOT") {
            return SpinelClientError::CrossSlot;
        }
        SpinelClientError::ServerError(text.to_string())
    }
}

fn parse_redirect(rest: &str) -> Option<(u16, String)> {
    let mut parts = rest.split_whitespace();
    let slot = parts.next()?.parse().ok()?;
    let addr = parts.next()?.to_string();
    Some((slot, addr))
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for SpinelClientError {
    fn from(e: std::io::Error) -> Self {
        SpinelClientError::Io(Arc::new(e))
    }
}

impl From<String> for SpinelClientError {
    fn from(s: String) -> Self {
        SpinelClientError::Connection(s)
    }
}
