// src/core/cluster/mod.rs

//! Routing descriptors: node handles, master/replica groups and the
//! `NodeSource` tag that tells the dispatcher where a command must land.

pub mod slot;

use std::fmt;
use std::sync::Arc;

/// An address-identified handle to a single node.
///
/// The connection manager resolves a `Server` to an actual pooled
/// connection; the dispatch core only ever passes handles around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Server {
    pub addr: String,
}

impl Server {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// A master plus its replicas, owning a contiguous range of hash slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    pub master: Server,
    pub replicas: Vec<Server>,
}

impl MasterEntry {
    pub fn new(master: Server, replicas: Vec<Server>) -> Self {
        Self { master, replicas }
    }

    /// Whether the given server is this entry's master.
    pub fn is_master(&self, server: &Server) -> bool {
        self.master == *server
    }
}

/// Distinguishes the two cluster redirection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// The slot has permanently moved; the topology should be refreshed.
    Moved,
    /// The slot is mid-migration; the next attempt must send `ASKING` first.
    Ask,
}

/// Identifies where a command must be sent.
///
/// Built by the selector methods on
/// [`CommandExecutor`](crate::core::dispatch::CommandExecutor) and consumed
/// by the connection manager when acquiring a connection. A `Redirected`
/// source carries a MOVED/ASK override on top of the original routing.
#[derive(Debug, Clone)]
pub enum NodeSource {
    /// A specific master-replica group.
    Entry(Arc<MasterEntry>),
    /// A slot number; the connection manager picks the owning group.
    Slot(u16),
    /// Slot-scoped, but forced onto a specific node.
    SlotAndServer(u16, Server),
    /// A specific node, no slot routing.
    Server(Server),
    /// A MOVED/ASK override carried over the original source.
    Redirected {
        origin: Box<NodeSource>,
        target: Server,
        kind: RedirectKind,
    },
}

impl NodeSource {
    /// Rebuilds this source with a redirection override, collapsing nested
    /// redirects so only the latest target is kept.
    pub fn redirected(self, target: Server, kind: RedirectKind) -> NodeSource {
        let origin = match self {
            NodeSource::Redirected { origin, .. } => origin,
            other => Box::new(other),
        };
        NodeSource::Redirected {
            origin,
            target,
            kind,
        }
    }

    /// Whether the next attempt on this source must be preceded by `ASKING`.
    pub fn is_asking(&self) -> bool {
        matches!(
            self,
            NodeSource::Redirected {
                kind: RedirectKind::Ask,
                ..
            }
        )
    }
}
