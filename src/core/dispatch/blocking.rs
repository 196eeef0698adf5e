// src/core/dispatch/blocking.rs

//! Multi-queue blocking pop, emulated on clustered deployments.
//!
//! A single node can serve `BLPOP q1 q2 q3 5` natively, but in a cluster the
//! queues may live on different slots. The emulation rotates over the queue
//! names with single-element non-blocking pops, consuming one second of the
//! shared budget per visited position. The caller's timeout is therefore an
//! upper bound, not a precise deadline.

use super::CommandExecutor;
use crate::core::SpinelClientError;
use crate::core::commands::CommandSpec;
use crate::core::types::Value;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

pub(crate) async fn poll_from_any(
    executor: &CommandExecutor,
    cmd: &CommandSpec<Value>,
    seconds_timeout: u64,
    keys: Vec<Bytes>,
) -> Result<Value, SpinelClientError> {
    if keys.is_empty() {
        return Err(SpinelClientError::InvalidArgument(
            "at least one queue name is required".to_string(),
        ));
    }

    if !executor.connection_manager().cluster_mode() {
        // The native command takes every queue plus the seconds timeout.
        let gateway = executor.gateway();
        let mut args = gateway.new_args();
        for key in &keys {
            args.push_bulk(key.clone());
        }
        args.push_int(seconds_timeout as i64);
        let source = executor.for_key(&keys[0]);
        return executor
            .execute_spec(false, source, cmd, args, false, false)
            .await;
    }

    // Strip the blocking prefix: BLPOP polls via LPOP, BRPOP via RPOP.
    let poll_name = cmd
        .name()
        .strip_prefix('B')
        .map(str::to_string)
        .unwrap_or_else(|| cmd.name().to_string());
    let poll_cmd = cmd.with_name(poll_name);

    debug!(
        command = cmd.name(),
        queues = keys.len(),
        seconds_timeout,
        "emulating blocking pop by rotation"
    );

    let mut remaining = seconds_timeout;
    loop {
        for key in &keys {
            let gateway = executor.gateway();
            let mut args = gateway.new_args();
            args.push_bulk(key.clone());
            args.push_int(1);

            let source = executor.for_key(key);
            let reply = executor
                .execute_spec(false, source, &poll_cmd, args, false, false)
                .await?;

            match reply {
                Value::Null => {}
                Value::List(items) if items.is_empty() => {}
                Value::List(mut items) => return Ok(items.swap_remove(0)),
                other => return Ok(other),
            }

            // One second of budget per visited position. A timeout of zero
            // means wait indefinitely, matching the native command.
            tokio::time::sleep(Duration::from_secs(1)).await;
            if seconds_timeout > 0 {
                remaining -= 1;
                if remaining == 0 {
                    return Ok(Value::Null);
                }
            }
        }
    }
}
