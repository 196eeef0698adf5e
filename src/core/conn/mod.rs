// src/core/conn/mod.rs

//! Collaborator traits for the connection layer.
//!
//! The dispatch core does not open sockets, track topology or pool
//! connections; it asks an injected [`ConnectionManager`] for a
//! [`NodeConnection`] per attempt and reports the classified outcome.

use crate::core::SpinelClientError;
use crate::core::cluster::{MasterEntry, NodeSource, Server, slot};
use crate::core::commands::args::CommandArg;
use crate::core::protocol::RespValue;
use crate::core::types::Codec;
use async_trait::async_trait;
use std::sync::Arc;

/// One live, request-response capable connection to a node.
///
/// A single attempt may issue more than one request on the same connection
/// (the `ASKING` pre-command ahead of a redirected attempt relies on this).
#[async_trait]
pub trait NodeConnection: Send + Sync {
    /// The node this connection is attached to.
    fn server(&self) -> Server;

    /// Whether the node currently serves as a master.
    fn is_master(&self) -> bool;

    /// Writes one command and awaits its decoded reply. Server-side errors
    /// come back as `RespValue::Error`; transport failures as `Err`.
    async fn request(
        &self,
        name: &str,
        args: &[CommandArg],
    ) -> Result<RespValue, SpinelClientError>;
}

/// Topology and pooling authority, implemented outside this crate.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// The default codec configured for this client.
    fn codec(&self) -> Arc<dyn Codec>;

    /// Whether this deployment is clustered.
    fn cluster_mode(&self) -> bool;

    /// Every known master-replica group.
    fn entries(&self) -> Vec<Arc<MasterEntry>>;

    /// The group currently owning a slot.
    fn entry_for_slot(&self, slot: u16) -> Option<Arc<MasterEntry>>;

    /// The group a node belongs to, if any.
    fn entry_for_server(&self, server: &Server) -> Option<Arc<MasterEntry>>;

    /// Slot computation; the default is the standard hash-tag CRC16 rule.
    fn calc_slot(&self, key: &[u8]) -> u16 {
        slot::get_slot(key)
    }

    /// Resolves a connection for one attempt.
    ///
    /// Replica selection honors `readonly`; a source carrying a forced or
    /// redirected server restricts the choice to that node. Pool exhaustion
    /// and connect failures surface as retriable connection errors.
    async fn acquire(
        &self,
        readonly: bool,
        source: &NodeSource,
    ) -> Result<Arc<dyn NodeConnection>, SpinelClientError>;
}
