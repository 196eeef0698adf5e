// src/core/dispatch/scatter.rs

//! Multi-node dispatch: all-node fan-out, random-sequential reads and
//! cross-slot batching.

use super::{BatchExecutor, CommandExecutor};
use crate::core::SpinelClientError;
use crate::core::cluster::{MasterEntry, NodeSource};
use crate::core::commands::CommandSpec;
use crate::core::dispatch::encode::EncodeAs;
use crate::core::protocol::RespValue;
use crate::core::types::{Codec, SlotCallback, Value};
use bytes::Bytes;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::debug;

/// The default aggregator: collects every per-node result into one list,
/// flattening collection results.
pub struct FlattenCallback {
    items: Mutex<Vec<Value>>,
}

impl FlattenCallback {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl Default for FlattenCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotCallback<Value, Value> for FlattenCallback {
    fn create_params(&self, _keys: &[Bytes]) -> Vec<Value> {
        Vec::new()
    }

    fn on_slot_result(&self, value: Value) {
        match value {
            Value::List(mut items) => self.items.lock().append(&mut items),
            other => self.items.lock().push(other),
        }
    }

    fn on_finish(&self) -> Value {
        let mut items = self.items.lock();
        Value::List(std::mem::take(&mut *items))
    }
}

/// Fans one command out to every master-replica group and reduces the
/// results through the callback.
///
/// Redirects are not followed here: a node that answers MOVED/ASK mid
/// fan-out is treated as completed, with the convertor applied to the
/// null-decoded reply. The first non-redirect failure fails the aggregate,
/// but only after every node has terminated and released its buffers.
pub(crate) async fn execute_all<T, R>(
    executor: &CommandExecutor,
    readonly: bool,
    codec: &Arc<dyn Codec>,
    cmd: &CommandSpec<T>,
    callback: &dyn SlotCallback<T, R>,
    params: &[Value],
) -> Result<R, SpinelClientError> {
    let entries = executor.connection_manager().entries();

    let mut submissions = Vec::with_capacity(entries.len());
    for entry in entries {
        let args = executor.encode_params(codec, params)?;
        submissions.push((entry, args));
    }

    let accumulator = Mutex::new(());
    let futures = submissions.into_iter().map(|(entry, args)| {
        let accumulator = &accumulator;
        async move {
            let result = executor
                .execute_raw(
                    readonly,
                    NodeSource::Entry(entry),
                    cmd.name(),
                    args,
                    false,
                    true,
                    None,
                )
                .await;
            match result {
                Ok(reply) => {
                    let value = cmd.decode(reply)?;
                    let _guard = accumulator.lock();
                    callback.on_slot_result(value);
                    Ok(())
                }
                Err(SpinelClientError::Moved { .. }) | Err(SpinelClientError::Ask { .. }) => {
                    // Accepted as a completion; the convertor still runs.
                    if let Ok(value) = cmd.decode(RespValue::Null) {
                        let _guard = accumulator.lock();
                        callback.on_slot_result(value);
                    }
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    });

    let mut first_error = None;
    for result in join_all(futures).await {
        if let Err(err) = result
            && first_error.is_none()
        {
            first_error = Some(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(callback.on_finish()),
    }
}

/// Tries nodes in random order until one returns a non-null value.
pub(crate) async fn execute_random(
    executor: &CommandExecutor,
    codec: &Arc<dyn Codec>,
    cmd: &CommandSpec<Value>,
    params: &[Value],
) -> Result<Value, SpinelClientError> {
    let mut entries = executor.connection_manager().entries();
    entries.shuffle(&mut SmallRng::from_entropy());

    for entry in entries {
        let args = executor.encode_params(codec, params)?;
        match executor
            .execute_spec(true, NodeSource::Entry(entry), cmd, args, false, false)
            .await
        {
            Ok(Value::Null) => continue,
            Ok(value) => return Ok(value),
            Err(err) => return Err(err),
        }
    }
    Ok(Value::Null)
}

/// Groups a multi-key command so no group spans hash slots, dispatches the
/// groups through a batch context and reduces the per-group replies.
pub(crate) async fn execute_batched<T, R>(
    executor: &CommandExecutor,
    readonly: bool,
    codec: &Arc<dyn Codec>,
    cmd: &CommandSpec<T>,
    callback: &dyn SlotCallback<T, R>,
    keys: &[Bytes],
    value_map: Option<&IndexMap<Bytes, Value>>,
    batch: Option<&dyn BatchExecutor>,
) -> Result<R, SpinelClientError> {
    // If the caller is already a batch context, reuse it so the groups
    // pipeline on its connections; otherwise the executor itself is the
    // transient context.
    let context: &dyn BatchExecutor = batch.unwrap_or(executor);

    let groups = group_by_slot(executor, keys)?;

    let mut submissions = Vec::with_capacity(groups.len());
    for (entry, group_keys) in groups {
        let group_cmd = callback
            .create_command(&group_keys)
            .unwrap_or_else(|| cmd.clone());
        let args = match value_map {
            // Interleave [k, v, k, v, ...] in the caller-provided order.
            Some(map) => {
                let gateway = executor.gateway();
                let mut args = gateway.new_args();
                for key in &group_keys {
                    gateway.encode(
                        codec.as_ref(),
                        &Value::Bytes(key.clone()),
                        EncodeAs::MapKey,
                        &mut args,
                    )?;
                    let value = map.get(key).ok_or_else(|| {
                        SpinelClientError::InvalidArgument(format!(
                            "no value supplied for key {key:?}"
                        ))
                    })?;
                    gateway.encode(codec.as_ref(), value, EncodeAs::MapValue, &mut args)?;
                }
                args
            }
            None => executor.encode_params(codec, &callback.create_params(&group_keys))?,
        };
        submissions.push((entry, group_cmd, args));
    }
    debug!(
        command = cmd.name(),
        groups = submissions.len(),
        "dispatching batched groups"
    );

    let accumulator = Mutex::new(());
    let futures = submissions.into_iter().map(|(entry, group_cmd, args)| {
        let accumulator = &accumulator;
        async move {
            let reply = if readonly {
                context.read_entry(&entry, group_cmd.name(), args).await?
            } else {
                context.write_entry(&entry, group_cmd.name(), args).await?
            };
            let value = group_cmd.decode(reply)?;
            let _guard = accumulator.lock();
            callback.on_slot_result(value);
            Ok::<(), SpinelClientError>(())
        }
    });

    let mut first_error = None;
    for result in join_all(futures).await {
        if let Err(err) = result
            && first_error.is_none()
        {
            first_error = Some(err);
        }
    }

    context.flush().await?;

    match first_error {
        Some(err) => Err(err),
        None => Ok(callback.on_finish()),
    }
}

/// Key grouping: everything on one entry outside cluster mode, otherwise by
/// owning slot (the server rejects multi-key commands spanning slots).
fn group_by_slot(
    executor: &CommandExecutor,
    keys: &[Bytes],
) -> Result<Vec<(Arc<MasterEntry>, Vec<Bytes>)>, SpinelClientError> {
    let manager = executor.connection_manager();

    if !manager.cluster_mode() {
        let entry = manager.entries().into_iter().next().ok_or_else(|| {
            SpinelClientError::InvalidState("no master entries are available".to_string())
        })?;
        return Ok(vec![(entry, keys.to_vec())]);
    }

    let mut groups: IndexMap<u16, (Arc<MasterEntry>, Vec<Bytes>)> = IndexMap::new();
    for key in keys {
        let slot = manager.calc_slot(key);
        if let Some((_, group_keys)) = groups.get_mut(&slot) {
            group_keys.push(key.clone());
            continue;
        }
        let entry = manager.entry_for_slot(slot).ok_or_else(|| {
            SpinelClientError::InvalidState(format!("hash slot {slot} is not covered"))
        })?;
        groups.insert(slot, (entry, vec![key.clone()]));
    }
    Ok(groups.into_values().collect())
}
