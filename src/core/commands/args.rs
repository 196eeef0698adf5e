// src/core/commands/args.rs

//! Encoded command arguments and the owned-args abstraction.
//!
//! Every encoded buffer is owned by exactly one [`OwnedArgs`] at a time, and
//! each buffer's release is reported exactly once when its owner is dropped.
//! Handing a buffer to another owner goes through [`OwnedArgs::append`],
//! which transfers ownership without touching the audit counts.

use bytes::Bytes;
use std::sync::Arc;

/// A single wire argument, already encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Bulk(Bytes),
    Int(i64),
}

impl CommandArg {
    /// Renders the argument as the bytes that go on the wire.
    pub fn to_wire(&self) -> Bytes {
        match self {
            CommandArg::Bulk(b) => b.clone(),
            CommandArg::Int(i) => {
                let mut buf = itoa::Buffer::new();
                Bytes::copy_from_slice(buf.format(*i).as_bytes())
            }
        }
    }

    pub fn as_bulk(&self) -> Option<&Bytes> {
        match self {
            CommandArg::Bulk(b) => Some(b),
            CommandArg::Int(_) => None,
        }
    }
}

/// Observes buffer allocation and release, for leak accounting.
///
/// The executor threads an optional audit through every argument list it
/// creates; tests install a counting implementation and assert that the two
/// counters match on every terminal path.
pub trait ArgAudit: Send + Sync {
    fn on_alloc(&self);
    fn on_release(&self);
}

/// Owns a list of encoded arguments and guarantees exactly-once release.
///
/// Release is tied to `Drop`, so the single-ownership rules of the language
/// are the mechanism: whichever branch ends up holding the `OwnedArgs` when
/// the command terminates releases the buffers, and no other branch can.
#[derive(Debug, Default)]
pub struct OwnedArgs {
    args: Vec<CommandArg>,
    audit: Option<Arc<dyn ArgAudit>>,
}

impl std::fmt::Debug for dyn ArgAudit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ArgAudit")
    }
}

impl OwnedArgs {
    pub fn new(audit: Option<Arc<dyn ArgAudit>>) -> Self {
        Self {
            args: Vec::new(),
            audit,
        }
    }

    pub fn with_capacity(audit: Option<Arc<dyn ArgAudit>>, capacity: usize) -> Self {
        Self {
            args: Vec::with_capacity(capacity),
            audit,
        }
    }

    /// Adds a freshly encoded buffer, reporting its allocation.
    pub fn push_bulk(&mut self, buffer: Bytes) {
        if let Some(audit) = &self.audit {
            audit.on_alloc();
        }
        self.args.push(CommandArg::Bulk(buffer));
    }

    /// Adds an integer argument. Integers carry no buffer and are not audited.
    pub fn push_int(&mut self, value: i64) {
        self.args.push(CommandArg::Int(value));
    }

    /// Moves every argument out of `other` into `self`.
    ///
    /// Ownership transfers wholesale: the audit counts are untouched and
    /// `other` is left empty, so its drop releases nothing.
    pub fn append(&mut self, mut other: OwnedArgs) {
        self.args.append(&mut other.args);
    }

    /// Copies every argument into independent, freshly allocated buffers.
    ///
    /// The copies survive the release of the originals, which is what the
    /// script-cache fallback needs to re-drive a command after its first
    /// attempt has consumed the argument list.
    pub fn deep_copy(&self) -> OwnedArgs {
        let mut copy = OwnedArgs::with_capacity(self.audit.clone(), self.args.len());
        for arg in &self.args {
            match arg {
                CommandArg::Bulk(b) => copy.push_bulk(Bytes::copy_from_slice(b)),
                CommandArg::Int(i) => copy.push_int(*i),
            }
        }
        copy
    }

    pub fn as_slice(&self) -> &[CommandArg] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Releases every owned buffer. Equivalent to dropping, named for the
    /// terminal-outcome call sites.
    pub fn release(self) {}
}

impl Drop for OwnedArgs {
    fn drop(&mut self) {
        if let Some(audit) = &self.audit {
            for arg in &self.args {
                if matches!(arg, CommandArg::Bulk(_)) {
                    audit.on_release();
                }
            }
        }
    }
}
