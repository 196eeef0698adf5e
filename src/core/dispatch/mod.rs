// src/core/dispatch/mod.rs

//! The command dispatch facade.
//!
//! [`CommandExecutor`] is the surface the typed facades call into: it
//! resolves a node source, encodes arguments, and drives each command
//! through the retry machinery. Multi-node patterns live in
//! [`scatter`]; blocking-poll emulation in [`blocking`].

pub(crate) mod attempt;
pub mod blocking;
pub(crate) mod encode;
pub(crate) mod retry;
pub mod scatter;

use crate::config::ClientConfig;
use crate::core::SpinelClientError;
use crate::core::cluster::{MasterEntry, NodeSource, Server};
use crate::core::commands::CommandSpec;
use crate::core::commands::args::{ArgAudit, OwnedArgs};
use crate::core::conn::ConnectionManager;
use crate::core::protocol::RespValue;
use crate::core::scripting;
use crate::core::types::{Codec, ReferenceBuilder, SlotCallback, Value};
use async_trait::async_trait;
use bytes::Bytes;
use encode::EncoderGateway;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Batch context for cross-slot dispatch.
///
/// A real implementation queues per-entry commands and pipelines them on
/// `flush`. The executor itself implements this trait with immediate
/// dispatch, serving as the transient context when the caller is not already
/// batching.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn read_entry(
        &self,
        entry: &Arc<MasterEntry>,
        name: &str,
        args: OwnedArgs,
    ) -> Result<RespValue, SpinelClientError>;

    async fn write_entry(
        &self,
        entry: &Arc<MasterEntry>,
        name: &str,
        args: OwnedArgs,
    ) -> Result<RespValue, SpinelClientError>;

    /// Flushes anything queued. The overall batched promise must not
    /// complete before this resolves.
    async fn flush(&self) -> Result<(), SpinelClientError>;
}

/// Routes commands to nodes and drives them to completion.
pub struct CommandExecutor {
    manager: Arc<dyn ConnectionManager>,
    config: ClientConfig,
    reference_builder: Option<Arc<dyn ReferenceBuilder>>,
    audit: Option<Arc<dyn ArgAudit>>,
    runtime: Option<Handle>,
}

impl CommandExecutor {
    /// Creates an executor over an externally managed connection layer.
    ///
    /// When constructed inside a runtime, the handle is captured for the
    /// synchronous bridges.
    pub fn new(manager: Arc<dyn ConnectionManager>, config: ClientConfig) -> Self {
        Self {
            manager,
            config,
            reference_builder: None,
            audit: None,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Installs the object-to-reference hook applied before encoding.
    pub fn with_reference_builder(mut self, builder: Arc<dyn ReferenceBuilder>) -> Self {
        self.reference_builder = Some(builder);
        self
    }

    /// Installs a buffer audit. Every encoded argument buffer reports one
    /// allocation and exactly one release through it.
    pub fn with_arg_audit(mut self, audit: Arc<dyn ArgAudit>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection_manager(&self) -> &Arc<dyn ConnectionManager> {
        &self.manager
    }

    /// The codec used when a call site does not supply one.
    pub fn default_codec(&self) -> Arc<dyn Codec> {
        self.manager.codec()
    }

    // --- Node selection -------------------------------------------------

    /// Routes by key: slot-scoped in cluster mode, default master otherwise.
    pub fn for_key(&self, key: impl AsRef<[u8]>) -> NodeSource {
        NodeSource::Slot(self.manager.calc_slot(key.as_ref()))
    }

    /// Routes by optional key; a missing key resolves to the default master
    /// (single-node deployments only — the cluster scatter paths never pass
    /// a missing key).
    pub fn for_optional_key(&self, key: Option<&[u8]>) -> NodeSource {
        match key {
            Some(key) => self.for_key(key),
            None => match self.manager.entries().into_iter().next() {
                Some(entry) => NodeSource::Entry(entry),
                None => NodeSource::Slot(0),
            },
        }
    }

    pub fn for_entry(&self, entry: Arc<MasterEntry>) -> NodeSource {
        NodeSource::Entry(entry)
    }

    pub fn for_server(&self, server: Server) -> NodeSource {
        NodeSource::Server(server)
    }

    // --- Single-node operations ----------------------------------------

    pub async fn read_async<T>(
        &self,
        key: impl AsRef<[u8]>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let source = self.for_key(key);
        self.read_source_async(source, &self.default_codec(), cmd, params)
            .await
    }

    pub async fn write_async<T>(
        &self,
        key: impl AsRef<[u8]>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let source = self.for_key(key);
        self.write_source_async(source, &self.default_codec(), cmd, params)
            .await
    }

    /// The general read form: explicit provenance and codec.
    pub async fn read_source_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let args = self.encode_params(codec, &params)?;
        self.execute_spec(true, source, cmd, args, false, false)
            .await
    }

    /// The general write form: explicit provenance and codec.
    pub async fn write_source_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let args = self.encode_params(codec, &params)?;
        self.execute_spec(false, source, cmd, args, false, false)
            .await
    }

    /// Like [`read_source_async`](Self::read_source_async) but terminates
    /// after the first retriable failure instead of sleeping and retrying.
    pub async fn read_source_once_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let args = self.encode_params(codec, &params)?;
        self.execute_spec(true, source, cmd, args, true, false).await
    }

    /// Like [`write_source_async`](Self::write_source_async) with retries
    /// disabled.
    pub async fn write_source_once_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let args = self.encode_params(codec, &params)?;
        self.execute_spec(false, source, cmd, args, true, false)
            .await
    }

    // --- Server-side scripting ------------------------------------------

    pub async fn eval_read_async<T>(
        &self,
        key: impl AsRef<[u8]>,
        cmd: &CommandSpec<T>,
        script: &str,
        keys: Vec<Bytes>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let source = self.for_key(key);
        scripting::dispatch_eval(
            self,
            true,
            source,
            &self.default_codec(),
            cmd,
            script,
            keys,
            params,
            false,
        )
        .await
    }

    pub async fn eval_write_async<T>(
        &self,
        key: impl AsRef<[u8]>,
        cmd: &CommandSpec<T>,
        script: &str,
        keys: Vec<Bytes>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        let source = self.for_key(key);
        scripting::dispatch_eval(
            self,
            false,
            source,
            &self.default_codec(),
            cmd,
            script,
            keys,
            params,
            false,
        )
        .await
    }

    pub async fn eval_read_source_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        script: &str,
        keys: Vec<Bytes>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        scripting::dispatch_eval(self, true, source, codec, cmd, script, keys, params, false).await
    }

    pub async fn eval_write_source_async<T>(
        &self,
        source: NodeSource,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        script: &str,
        keys: Vec<Bytes>,
        params: Vec<Value>,
    ) -> Result<T, SpinelClientError> {
        scripting::dispatch_eval(self, false, source, codec, cmd, script, keys, params, false)
            .await
    }

    // --- Multi-node operations ------------------------------------------

    /// Reads from every master-replica group, flattening the results.
    pub async fn read_all_async(
        &self,
        cmd: &CommandSpec<Value>,
        params: Vec<Value>,
    ) -> Result<Value, SpinelClientError> {
        let callback = scatter::FlattenCallback::new();
        scatter::execute_all(self, true, &self.default_codec(), cmd, &callback, &params).await
    }

    /// Reads from every group, reducing through the supplied callback.
    pub async fn read_all_with_async<T, R>(
        &self,
        cmd: &CommandSpec<T>,
        callback: &dyn SlotCallback<T, R>,
        params: Vec<Value>,
    ) -> Result<R, SpinelClientError> {
        scatter::execute_all(self, true, &self.default_codec(), cmd, callback, &params).await
    }

    /// Writes to every master, flattening the results.
    pub async fn write_all_async(
        &self,
        cmd: &CommandSpec<Value>,
        params: Vec<Value>,
    ) -> Result<Value, SpinelClientError> {
        let callback = scatter::FlattenCallback::new();
        scatter::execute_all(self, false, &self.default_codec(), cmd, &callback, &params).await
    }

    /// Writes to every master, reducing through the supplied callback.
    pub async fn write_all_with_async<T, R>(
        &self,
        cmd: &CommandSpec<T>,
        callback: &dyn SlotCallback<T, R>,
        params: Vec<Value>,
    ) -> Result<R, SpinelClientError> {
        scatter::execute_all(self, false, &self.default_codec(), cmd, callback, &params).await
    }

    /// Runs a script on every master. The literal text is sent: the fan-out
    /// cannot pin a single node for a digest reload, so the script cache
    /// does not apply here.
    pub async fn eval_write_all_async(
        &self,
        cmd: &CommandSpec<Value>,
        script: &str,
        keys: Vec<Bytes>,
        params: Vec<Value>,
    ) -> Result<Value, SpinelClientError> {
        let mut all_params = Vec::with_capacity(2 + keys.len() + params.len());
        all_params.push(Value::Str(script.to_string()));
        all_params.push(Value::Int(keys.len() as i64));
        all_params.extend(keys.into_iter().map(Value::Bytes));
        all_params.extend(params);
        let callback = scatter::FlattenCallback::new();
        scatter::execute_all(
            self,
            false,
            &self.default_codec(),
            cmd,
            &callback,
            &all_params,
        )
        .await
    }

    /// Pre-warms a script on every master, returning its digest.
    pub async fn script_load_all_async(&self, script: &str) -> Result<String, SpinelClientError> {
        let sha = scripting::script_digest(script);
        scatter::execute_all(
            self,
            false,
            &self.default_codec(),
            &crate::core::commands::builtin::SCRIPT_LOAD,
            &DiscardCallback,
            &[Value::Str("LOAD".to_string()), Value::Str(script.to_string())],
        )
        .await?;
        Ok(sha)
    }

    /// Reads from nodes in random order until one returns a non-null value.
    pub async fn read_random_async(
        &self,
        cmd: &CommandSpec<Value>,
        params: Vec<Value>,
    ) -> Result<Value, SpinelClientError> {
        scatter::execute_random(self, &self.default_codec(), cmd, &params).await
    }

    /// Multi-key read split into per-slot groups.
    pub async fn read_batched_async<T, R>(
        &self,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        callback: &dyn SlotCallback<T, R>,
        keys: Vec<Bytes>,
        batch: Option<&dyn BatchExecutor>,
    ) -> Result<R, SpinelClientError> {
        scatter::execute_batched(self, true, codec, cmd, callback, &keys, None, batch).await
    }

    /// Multi-key write split into per-slot groups.
    pub async fn write_batched_async<T, R>(
        &self,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        callback: &dyn SlotCallback<T, R>,
        keys: Vec<Bytes>,
        batch: Option<&dyn BatchExecutor>,
    ) -> Result<R, SpinelClientError> {
        scatter::execute_batched(self, false, codec, cmd, callback, &keys, None, batch).await
    }

    /// Keyed-value write: per group the arguments interleave
    /// `[k, v, k, v, …]` in the map's order, keys through the map-key
    /// encoder and values through the map-value encoder.
    pub async fn write_batched_map_async<T, R>(
        &self,
        codec: &Arc<dyn Codec>,
        cmd: &CommandSpec<T>,
        callback: &dyn SlotCallback<T, R>,
        value_map: &IndexMap<Bytes, Value>,
        batch: Option<&dyn BatchExecutor>,
    ) -> Result<R, SpinelClientError> {
        let keys: Vec<Bytes> = value_map.keys().cloned().collect();
        scatter::execute_batched(
            self,
            false,
            codec,
            cmd,
            callback,
            &keys,
            Some(value_map),
            batch,
        )
        .await
    }

    /// Blocking pop across several queues: native on a single node, rotated
    /// non-blocking polls on a cluster.
    pub async fn poll_from_any_async(
        &self,
        cmd: &CommandSpec<Value>,
        seconds_timeout: u64,
        keys: Vec<Bytes>,
    ) -> Result<Value, SpinelClientError> {
        blocking::poll_from_any(self, cmd, seconds_timeout, keys).await
    }

    // --- Subscription budget and sync bridges ---------------------------

    /// Awaits a subscription future under the dedicated subscription budget.
    pub async fn await_subscription<T, F>(&self, future: F) -> Result<T, SpinelClientError>
    where
        F: Future<Output = Result<T, SpinelClientError>>,
    {
        let budget = self.config.subscription_timeout();
        match tokio::time::timeout(budget, future).await {
            Ok(result) => result,
            Err(_) => Err(SpinelClientError::SubscribeTimeout(format!(
                "subscription not established within {budget:?}"
            ))),
        }
    }

    /// Blocks on a command future and unwraps its result.
    ///
    /// Refuses to run on a transport worker thread: blocking there would
    /// park the event loop the future needs to make progress.
    pub fn get_sync<T, F>(&self, future: F) -> Result<T, SpinelClientError>
    where
        F: Future<Output = Result<T, SpinelClientError>>,
    {
        let handle = self.sync_bridge_handle()?;
        handle.block_on(future)
    }

    /// Blocks on a subscription future under the subscription budget.
    ///
    /// On expiry the future is dropped (cancelling the pending work and
    /// releasing its buffers) and the subscribe-timeout error is returned.
    pub fn subscribe_sync<T, F>(&self, future: F) -> Result<T, SpinelClientError>
    where
        F: Future<Output = Result<T, SpinelClientError>>,
    {
        let handle = self.sync_bridge_handle()?;
        handle.block_on(self.await_subscription(future))
    }

    fn sync_bridge_handle(&self) -> Result<Handle, SpinelClientError> {
        if Handle::try_current().is_ok() {
            return Err(SpinelClientError::InvalidState(
                "synchronous bridge invoked from a transport worker thread; \
                 use the *_async variants here"
                    .to_string(),
            ));
        }
        self.runtime.clone().ok_or_else(|| {
            SpinelClientError::InvalidState(
                "no runtime handle captured; construct the executor inside the runtime \
                 or use the *_async variants"
                    .to_string(),
            )
        })
    }

    // --- Internals ------------------------------------------------------

    pub(crate) fn gateway(&self) -> EncoderGateway {
        EncoderGateway::new(self.reference_builder.clone(), self.audit.clone())
    }

    pub(crate) fn encode_params(
        &self,
        codec: &Arc<dyn Codec>,
        params: &[Value],
    ) -> Result<OwnedArgs, SpinelClientError> {
        let gateway = self.gateway();
        let mut args = gateway.new_args();
        gateway.encode_params(codec.as_ref(), params, &mut args)?;
        Ok(args)
    }

    pub(crate) async fn execute_raw(
        &self,
        readonly: bool,
        source: NodeSource,
        name: &str,
        args: OwnedArgs,
        no_retry: bool,
        ignore_redirect: bool,
        served_by: Option<&Mutex<Option<(Server, bool)>>>,
    ) -> Result<RespValue, SpinelClientError> {
        retry::drive_command(
            &self.manager,
            &self.config,
            readonly,
            source,
            name,
            args,
            no_retry,
            ignore_redirect,
            served_by,
        )
        .await
    }

    pub(crate) async fn execute_spec<T>(
        &self,
        readonly: bool,
        source: NodeSource,
        cmd: &CommandSpec<T>,
        args: OwnedArgs,
        no_retry: bool,
        ignore_redirect: bool,
    ) -> Result<T, SpinelClientError> {
        let reply = self
            .execute_raw(
                readonly,
                source,
                cmd.name(),
                args,
                no_retry,
                ignore_redirect,
                None,
            )
            .await?;
        cmd.decode(reply)
    }
}

/// Discards per-node results; used where only overall success matters.
struct DiscardCallback;

impl<T> SlotCallback<T, ()> for DiscardCallback {
    fn create_params(&self, _keys: &[Bytes]) -> Vec<Value> {
        Vec::new()
    }

    fn on_slot_result(&self, _value: T) {}

    fn on_finish(&self) {}
}

#[async_trait]
impl BatchExecutor for CommandExecutor {
    async fn read_entry(
        &self,
        entry: &Arc<MasterEntry>,
        name: &str,
        args: OwnedArgs,
    ) -> Result<RespValue, SpinelClientError> {
        self.execute_raw(
            true,
            NodeSource::Entry(entry.clone()),
            name,
            args,
            false,
            false,
            None,
        )
        .await
    }

    async fn write_entry(
        &self,
        entry: &Arc<MasterEntry>,
        name: &str,
        args: OwnedArgs,
    ) -> Result<RespValue, SpinelClientError> {
        self.execute_raw(
            false,
            NodeSource::Entry(entry.clone()),
            name,
            args,
            false,
            false,
            None,
        )
        .await
    }

    async fn flush(&self) -> Result<(), SpinelClientError> {
        // Immediate dispatch leaves nothing queued.
        Ok(())
    }
}
