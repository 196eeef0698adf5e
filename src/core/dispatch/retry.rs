// src/core/dispatch/retry.rs

//! The retry driver: drives one logical command to a terminal outcome.
//!
//! Each command runs an explicit state machine. Attempts are strictly
//! sequential; a redirect rebuilds the node source and resets the attempt
//! budget (redirects do not consume retries); a retriable failure sleeps for
//! the configured interval before the next attempt.

use super::attempt::{AttemptOutcome, attempt_once};
use crate::config::ClientConfig;
use crate::core::SpinelClientError;
use crate::core::cluster::{NodeSource, RedirectKind, Server};
use crate::core::commands::args::OwnedArgs;
use crate::core::conn::ConnectionManager;
use crate::core::protocol::RespValue;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What the state machine does with one classified attempt.
#[derive(Debug)]
pub(crate) enum RetryDecision {
    Complete(RespValue),
    Fail(SpinelClientError),
    RetryAfter(Duration),
    Follow {
        target: Server,
        kind: RedirectKind,
    },
}

/// The pure transition function of the retry state machine.
pub(crate) fn decide(
    outcome: AttemptOutcome,
    attempts_left: u32,
    config: &ClientConfig,
    no_retry: bool,
    ignore_redirect: bool,
) -> RetryDecision {
    match outcome {
        AttemptOutcome::Success(reply) => RetryDecision::Complete(reply),
        AttemptOutcome::Fatal(err) => RetryDecision::Fail(err),
        AttemptOutcome::Redirect { slot, server, kind } => {
            if ignore_redirect {
                // The caller (scatter/gather) handles redirects itself.
                let err = match kind {
                    RedirectKind::Moved => SpinelClientError::Moved {
                        slot,
                        addr: server.addr,
                    },
                    RedirectKind::Ask => SpinelClientError::Ask {
                        slot,
                        addr: server.addr,
                    },
                };
                RetryDecision::Fail(err)
            } else {
                RetryDecision::Follow {
                    target: server,
                    kind,
                }
            }
        }
        AttemptOutcome::Retriable(err) => retriable(err, attempts_left, config, no_retry),
        AttemptOutcome::TimedOut => retriable(
            SpinelClientError::AttemptTimeout,
            attempts_left,
            config,
            no_retry,
        ),
    }
}

fn retriable(
    cause: SpinelClientError,
    attempts_left: u32,
    config: &ClientConfig,
    no_retry: bool,
) -> RetryDecision {
    if no_retry {
        return RetryDecision::Fail(cause);
    }
    if attempts_left == 0 {
        return RetryDecision::Fail(SpinelClientError::RetriesExhausted {
            attempts: config.retry_attempts,
            cause: Box::new(cause),
        });
    }
    RetryDecision::RetryAfter(config.retry_interval)
}

/// Runs the attempt loop until the command terminates, then releases the
/// argument buffers exactly once by consuming them.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn drive_command(
    manager: &Arc<dyn ConnectionManager>,
    config: &ClientConfig,
    readonly: bool,
    mut source: NodeSource,
    name: &str,
    args: OwnedArgs,
    no_retry: bool,
    ignore_redirect: bool,
    served_by: Option<&Mutex<Option<(Server, bool)>>>,
) -> Result<RespValue, SpinelClientError> {
    let mut attempts_left = config.retry_attempts;

    loop {
        let report = attempt_once(
            manager,
            readonly,
            &source,
            name,
            args.as_slice(),
            config.timeout,
        )
        .await;

        if let (Some(cell), Some(node)) = (served_by, report.served_by) {
            *cell.lock() = Some(node);
        }

        match decide(
            report.outcome,
            attempts_left,
            config,
            no_retry,
            ignore_redirect,
        ) {
            RetryDecision::Complete(reply) => {
                args.release();
                return Ok(reply);
            }
            RetryDecision::Fail(err) => {
                if matches!(err, SpinelClientError::RetriesExhausted { .. }) {
                    warn!(command = name, error = %err, "retry budget exhausted");
                }
                args.release();
                return Err(err);
            }
            RetryDecision::RetryAfter(interval) => {
                debug!(command = name, attempts_left, "retrying after interval");
                attempts_left -= 1;
                tokio::time::sleep(interval).await;
            }
            RetryDecision::Follow { target, kind } => {
                debug!(command = name, target = %target, ?kind, "following redirect");
                source = source.redirected(target, kind);
                // Redirects do not consume the retry budget.
                attempts_left = config.retry_attempts;
            }
        }
    }
}
