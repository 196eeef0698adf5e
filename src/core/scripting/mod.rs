// src/core/scripting/mod.rs

//! Transparent server-side script cache.
//!
//! When enabled, an `EVAL` is rewritten to `EVALSHA` over the script's SHA-1
//! digest. A `NOSCRIPT` reply triggers `SCRIPT LOAD` on the node that
//! answered, followed by one re-dispatch of the `EVALSHA` pinned to that
//! node. The caller sees none of this; a digest-table miss only costs one
//! local hash computation.

use crate::core::SpinelClientError;
use crate::core::cluster::{NodeSource, Server};
use crate::core::commands::CommandSpec;
use crate::core::dispatch::CommandExecutor;
use crate::core::types::{Codec, Value};
use bytes::Bytes;
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on remembered script digests.
const DIGEST_TABLE_CAPACITY: usize = 500;

/// Process-wide script-text to SHA-1-hex table.
///
/// Purely a local optimization: an eviction only means one extra SHA-1
/// computation on the next use of that script.
static SCRIPT_DIGESTS: Lazy<Mutex<LruCache<String, String>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(DIGEST_TABLE_CAPACITY).expect("capacity is non-zero"),
    ))
});

/// Returns the SHA-1 hex digest of a script, computing and remembering it on
/// first use.
pub fn script_digest(script: &str) -> String {
    let mut table = SCRIPT_DIGESTS.lock();
    if let Some(sha) = table.get(script) {
        return sha.clone();
    }
    let sha = hex::encode(Sha1::digest(script.as_bytes()));
    table.put(script.to_string(), sha.clone());
    sha
}

/// Dispatches an eval-family command, applying the script cache when it is
/// enabled and the command is a literal `EVAL`.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn dispatch_eval<T>(
    executor: &CommandExecutor,
    readonly: bool,
    source: NodeSource,
    codec: &Arc<dyn Codec>,
    cmd: &CommandSpec<T>,
    script: &str,
    keys: Vec<Bytes>,
    params: Vec<Value>,
    no_retry: bool,
) -> Result<T, SpinelClientError> {
    let gateway = executor.gateway();
    let key_count = keys.len() as i64;

    // Keys and encoded parameters form the tail shared by every variant of
    // this call; the head is either the script text or its digest.
    let mut tail = gateway.new_args();
    for key in &keys {
        tail.push_bulk(key.clone());
    }
    gateway.encode_params(codec.as_ref(), &params, &mut tail)?;

    if !executor.config().use_script_cache || cmd.name() != "EVAL" {
        let mut args = gateway.new_args();
        args.push_bulk(Bytes::copy_from_slice(script.as_bytes()));
        args.push_int(key_count);
        args.append(tail);
        return executor
            .execute_spec(readonly, source, cmd, args, no_retry, false)
            .await;
    }

    // The first attempt consumes its argument buffers, so the retry after a
    // script load needs an independent copy taken up front.
    let pps = tail.deep_copy();

    let sha = script_digest(script);
    let evalsha = cmd.with_name("EVALSHA");

    let mut first_args = gateway.new_args();
    first_args.push_bulk(Bytes::copy_from_slice(sha.as_bytes()));
    first_args.push_int(key_count);
    first_args.append(tail);

    // Single attempt: any failure must be classified here, not retried away.
    let served_by: Mutex<Option<(Server, bool)>> = Mutex::new(None);
    let first = executor
        .execute_raw(
            readonly,
            source,
            evalsha.name(),
            first_args,
            true,
            false,
            Some(&served_by),
        )
        .await;

    match first {
        Ok(reply) => {
            pps.release();
            evalsha.decode(reply)
        }
        Err(SpinelClientError::NoScript(_)) => {
            let Some((server, is_master)) = served_by.lock().clone() else {
                pps.release();
                return Err(SpinelClientError::Internal(
                    "NOSCRIPT reply without a serving node".to_string(),
                ));
            };
            debug!(%server, sha, "script missing on node, loading");

            // Load onto the exact node that reported NOSCRIPT. Writing to a
            // replica is rejected server-side, so replicas are loaded
            // through the read path.
            let mut load_args = gateway.new_args();
            load_args.push_bulk(Bytes::from_static(b"LOAD"));
            load_args.push_bulk(Bytes::copy_from_slice(script.as_bytes()));
            let load = executor
                .execute_raw(
                    !is_master,
                    NodeSource::Server(server.clone()),
                    "SCRIPT",
                    load_args,
                    true,
                    false,
                    None,
                )
                .await;

            if let Err(err) = load {
                pps.release();
                return Err(err);
            }

            // Re-drive the EVALSHA with the preserved copy, pinned to the
            // node that now holds the script. The copy becomes the second
            // attempt's owned arguments and is released on its terminal
            // outcome.
            let mut second_args = gateway.new_args();
            second_args.push_bulk(Bytes::copy_from_slice(sha.as_bytes()));
            second_args.push_int(key_count);
            second_args.append(pps);

            let reply = executor
                .execute_raw(
                    readonly,
                    NodeSource::Server(server),
                    evalsha.name(),
                    second_args,
                    no_retry,
                    false,
                    None,
                )
                .await?;
            evalsha.decode(reply)
        }
        Err(other) => {
            pps.release();
            Err(other)
        }
    }
}
