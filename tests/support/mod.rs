// tests/support/mod.rs

//! Shared fixtures: a scriptable in-process backend standing in for the
//! connection layer, plus a counting buffer audit.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use spinel_client::config::ClientConfig;
use spinel_client::core::cluster::{MasterEntry, NodeSource, Server};
use spinel_client::core::commands::args::{ArgAudit, CommandArg};
use spinel_client::core::conn::{ConnectionManager, NodeConnection};
use spinel_client::core::dispatch::CommandExecutor;
use spinel_client::core::protocol::RespValue;
use spinel_client::core::types::{Codec, StringCodec};
use spinel_client::core::SpinelClientError;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type Handler =
    Box<dyn Fn(&str, &[Bytes]) -> Result<RespValue, SpinelClientError> + Send + Sync>;

/// One fake node. Replies come from an explicit queue first, then from the
/// installed handler, and default to `+OK`. Every request is logged.
pub struct MockNode {
    pub server: Server,
    pub master: bool,
    log: Mutex<Vec<(String, Vec<Bytes>)>>,
    queue: Mutex<VecDeque<Result<RespValue, SpinelClientError>>>,
    handler: Mutex<Option<Handler>>,
    delay: Mutex<Option<Duration>>,
}

impl MockNode {
    pub fn new(addr: &str, master: bool) -> Arc<Self> {
        Arc::new(Self {
            server: Server::new(addr),
            master,
            log: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            handler: Mutex::new(None),
            delay: Mutex::new(None),
        })
    }

    pub fn push_reply(&self, reply: Result<RespValue, SpinelClientError>) {
        self.queue.lock().push_back(reply);
    }

    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[Bytes]) -> Result<RespValue, SpinelClientError> + Send + Sync + 'static,
    {
        *self.handler.lock() = Some(Box::new(handler));
    }

    /// Delays every reply, for attempt-timeout tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(String, Vec<Bytes>)> {
        self.log.lock().clone()
    }

    pub fn command_count(&self, name: &str) -> usize {
        self.log.lock().iter().filter(|(n, _)| n == name).count()
    }
}

#[async_trait]
impl NodeConnection for MockNode {
    fn server(&self) -> Server {
        self.server.clone()
    }

    fn is_master(&self) -> bool {
        self.master
    }

    async fn request(
        &self,
        name: &str,
        args: &[CommandArg],
    ) -> Result<RespValue, SpinelClientError> {
        let rendered: Vec<Bytes> = args.iter().map(CommandArg::to_wire).collect();
        self.log.lock().push((name.to_string(), rendered.clone()));

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = self.queue.lock().pop_front() {
            return reply;
        }
        if let Some(handler) = self.handler.lock().as_ref() {
            return handler(name, &rendered);
        }
        Ok(RespValue::SimpleString("OK".to_string()))
    }
}

/// A fake topology: entries, their nodes and a slot-ownership table.
pub struct MockManager {
    cluster: bool,
    read_from_replicas: bool,
    entries: Vec<Arc<MasterEntry>>,
    nodes: HashMap<Server, Arc<MockNode>>,
    slot_owners: Mutex<HashMap<u16, usize>>,
}

impl MockManager {
    pub fn new(cluster: bool) -> Self {
        Self {
            cluster,
            read_from_replicas: false,
            entries: Vec::new(),
            nodes: HashMap::new(),
            slot_owners: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_entry(&mut self, master: Arc<MockNode>, replicas: Vec<Arc<MockNode>>) {
        let entry = MasterEntry::new(
            master.server.clone(),
            replicas.iter().map(|r| r.server.clone()).collect(),
        );
        self.entries.push(Arc::new(entry));
        self.nodes.insert(master.server.clone(), master);
        for replica in replicas {
            self.nodes.insert(replica.server.clone(), replica);
        }
    }

    pub fn read_from_replicas(mut self, yes: bool) -> Self {
        self.read_from_replicas = yes;
        self
    }

    /// Pins a slot to an entry index, overriding the modulo default.
    pub fn assign_slot(&self, slot: u16, entry_index: usize) {
        self.slot_owners.lock().insert(slot, entry_index);
    }

    fn entry_index_for_slot(&self, slot: u16) -> usize {
        if let Some(index) = self.slot_owners.lock().get(&slot) {
            return *index;
        }
        slot as usize % self.entries.len().max(1)
    }

    fn pick(&self, entry: &MasterEntry, readonly: bool) -> Server {
        if readonly && self.read_from_replicas && !entry.replicas.is_empty() {
            entry.replicas[0].clone()
        } else {
            entry.master.clone()
        }
    }
}

#[async_trait]
impl ConnectionManager for MockManager {
    fn codec(&self) -> Arc<dyn Codec> {
        Arc::new(StringCodec)
    }

    fn cluster_mode(&self) -> bool {
        self.cluster
    }

    fn entries(&self) -> Vec<Arc<MasterEntry>> {
        self.entries.clone()
    }

    fn entry_for_slot(&self, slot: u16) -> Option<Arc<MasterEntry>> {
        self.entries.get(self.entry_index_for_slot(slot)).cloned()
    }

    fn entry_for_server(&self, server: &Server) -> Option<Arc<MasterEntry>> {
        self.entries
            .iter()
            .find(|entry| entry.master == *server || entry.replicas.contains(server))
            .cloned()
    }

    async fn acquire(
        &self,
        readonly: bool,
        source: &NodeSource,
    ) -> Result<Arc<dyn NodeConnection>, SpinelClientError> {
        let server = match source {
            NodeSource::Redirected { target, .. } => target.clone(),
            NodeSource::Server(server) => server.clone(),
            NodeSource::SlotAndServer(_, server) => server.clone(),
            NodeSource::Entry(entry) => self.pick(entry, readonly),
            NodeSource::Slot(slot) => {
                let entry = self.entry_for_slot(*slot).ok_or_else(|| {
                    SpinelClientError::InvalidState(format!("hash slot {slot} is not covered"))
                })?;
                self.pick(&entry, readonly)
            }
        };
        let node = self.nodes.get(&server).cloned().ok_or_else(|| {
            SpinelClientError::Connection(format!("no connection to node {server}"))
        })?;
        let conn: Arc<dyn NodeConnection> = node;
        Ok(conn)
    }
}

/// Counts buffer allocations and releases; balanced counters on every
/// terminal path are the buffer-conservation invariant.
#[derive(Default)]
pub struct CountingAudit {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl CountingAudit {
    pub fn counts(&self) -> (usize, usize) {
        (
            self.allocated.load(Ordering::SeqCst),
            self.released.load(Ordering::SeqCst),
        )
    }

    pub fn assert_balanced(&self) {
        let (allocated, released) = self.counts();
        assert_eq!(
            allocated, released,
            "buffer audit out of balance: {allocated} allocated, {released} released"
        );
        assert!(allocated > 0, "audit saw no buffers at all");
    }
}

impl ArgAudit for CountingAudit {
    fn on_alloc(&self) {
        self.allocated.fetch_add(1, Ordering::SeqCst);
    }

    fn on_release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

// --- Common scenarios ---------------------------------------------------

/// A single standalone master.
pub fn single_node() -> (Arc<MockManager>, Arc<MockNode>) {
    let node = MockNode::new("127.0.0.1:7000", true);
    let mut manager = MockManager::new(false);
    manager.add_entry(node.clone(), Vec::new());
    (Arc::new(manager), node)
}

/// A cluster of `masters` single-node entries.
pub fn cluster(masters: usize) -> (Arc<MockManager>, Vec<Arc<MockNode>>) {
    let mut manager = MockManager::new(true);
    let mut nodes = Vec::with_capacity(masters);
    for i in 0..masters {
        let node = MockNode::new(&format!("127.0.0.1:{}", 7000 + i), true);
        manager.add_entry(node.clone(), Vec::new());
        nodes.push(node);
    }
    (Arc::new(manager), nodes)
}

/// Short timeouts so retry tests stay fast.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_millis(200),
        retry_attempts: 2,
        retry_interval: Duration::from_millis(100),
        use_script_cache: false,
        subscription_pool_size: 50,
    }
}

pub fn executor_with(manager: Arc<MockManager>, config: ClientConfig) -> CommandExecutor {
    CommandExecutor::new(manager, config)
}

/// Opt-in log output for debugging a failing test: RUST_LOG=debug.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
