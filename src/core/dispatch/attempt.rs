// src/core/dispatch/attempt.rs

//! A single command attempt against a single node, and its classification.

use crate::core::SpinelClientError;
use crate::core::cluster::{NodeSource, RedirectKind, Server};
use crate::core::commands::args::CommandArg;
use crate::core::conn::ConnectionManager;
use crate::core::protocol::RespValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How one attempt ended.
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Success(RespValue),
    /// The server told us the slot lives elsewhere.
    Redirect {
        slot: u16,
        server: Server,
        kind: RedirectKind,
    },
    /// Worth another attempt: connection trouble or an idle server-side
    /// reject (TRYAGAIN/LOADING).
    Retriable(SpinelClientError),
    /// The per-attempt deadline elapsed.
    TimedOut,
    /// Not retriable; surfaced as-is.
    Fatal(SpinelClientError),
}

/// One attempt plus the node that actually served it.
#[derive(Debug)]
pub(crate) struct AttemptReport {
    pub outcome: AttemptOutcome,
    pub served_by: Option<(Server, bool)>,
}

/// Executes exactly one attempt. Retry and redirect-following belong to the
/// retry driver; this function only classifies.
pub(crate) async fn attempt_once(
    manager: &Arc<dyn ConnectionManager>,
    readonly: bool,
    source: &NodeSource,
    name: &str,
    args: &[CommandArg],
    timeout: Duration,
) -> AttemptReport {
    let conn = match manager.acquire(readonly, source).await {
        Ok(conn) => conn,
        Err(err) => {
            debug!(command = name, error = %err, "connection acquisition failed");
            return AttemptReport {
                outcome: AttemptOutcome::Retriable(err),
                served_by: None,
            };
        }
    };
    let served_by = Some((conn.server(), conn.is_master()));

    let request = async {
        // A transient ASK redirect only applies to the next command on the
        // target node, and only after an ASKING handshake on that connection.
        if source.is_asking() {
            conn.request("ASKING", &[]).await?;
        }
        conn.request(name, args).await
    };

    let outcome = match tokio::time::timeout(timeout, request).await {
        Err(_) => {
            debug!(command = name, ?timeout, "attempt timed out");
            AttemptOutcome::TimedOut
        }
        Ok(Err(err)) => classify_transport_error(err),
        Ok(Ok(reply)) => classify_reply(reply),
    };

    AttemptReport { outcome, served_by }
}

fn classify_transport_error(err: SpinelClientError) -> AttemptOutcome {
    match err {
        e @ (SpinelClientError::Io(_)
        | SpinelClientError::Connection(_)
        | SpinelClientError::TryAgain(_)) => AttemptOutcome::Retriable(e),
        SpinelClientError::AttemptTimeout => AttemptOutcome::TimedOut,
        other => AttemptOutcome::Fatal(other),
    }
}

fn classify_reply(reply: RespValue) -> AttemptOutcome {
    let Some(text) = reply.as_error() else {
        return AttemptOutcome::Success(reply);
    };

    match SpinelClientError::from_server_reply(text) {
        SpinelClientError::Moved { slot, addr } => AttemptOutcome::Redirect {
            slot,
            server: Server::new(addr),
            kind: RedirectKind::Moved,
        },
        SpinelClientError::Ask { slot, addr } => AttemptOutcome::Redirect {
            slot,
            server: Server::new(addr),
            kind: RedirectKind::Ask,
        },
        e @ SpinelClientError::TryAgain(_) => AttemptOutcome::Retriable(e),
        other => AttemptOutcome::Fatal(other),
    }
}
