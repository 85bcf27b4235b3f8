//! Commands dispatched from the HTTP API to the registry event loop.

use aegis_core::{DidKey, EventRecord, Identity, RegistryCall};
use aegis_registry::RegistryError;
use serde::Serialize;
use tokio::sync::oneshot;

/// Reply channel carried by every command.
pub type Reply<T> = oneshot::Sender<Result<T, CommandError>>;

/// Why the event loop refused a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Single field of a DID record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Owner,
    PublicKey,
    DocumentRef,
}

impl RecordField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::PublicKey => "public_key",
            Self::DocumentRef => "document_ref",
        }
    }
}

/// A command sent from the HTTP API to the node's registry event loop.
///
/// The event loop is the only owner of the registry, so commands are
/// applied strictly one at a time in arrival order.
pub enum NodeCommand {
    /// Apply an already-authenticated mutation signed against `revision`.
    Apply {
        caller: Identity,
        call: RegistryCall,
        revision: u64,
        reply: Reply<ApplyResponse>,
    },
    /// Read one field of a record.
    Lookup {
        key: DidKey,
        field: RecordField,
        reply: Reply<FieldResponse>,
    },
    /// Read a whole record.
    GetRecord {
        key: DidKey,
        reply: Reply<RecordResponse>,
    },
    /// Registration check; never fails for a well-formed key.
    IsRegistered {
        key: DidKey,
        reply: Reply<RegisteredResponse>,
    },
    /// Page through the event log.
    Events {
        since: u64,
        limit: usize,
        reply: Reply<EventsResponse>,
    },
    /// Merkle root over the full event log.
    Audit { reply: Reply<AuditResponse> },
    /// Registry counters for the status endpoint.
    Status { reply: Reply<RegistryStats> },
}

/// Response after a mutation commits.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResponse {
    pub caller: Identity,
    pub record: EventRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldResponse {
    pub key: DidKey,
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub key: DidKey,
    pub owner: Identity,
    pub public_key: String,
    pub document_ref: String,
    /// Revision the next signed update must carry.
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredResponse {
    pub key: DidKey,
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    /// Sequence to pass as `since` on the next poll.
    pub next_sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResponse {
    /// Hex-encoded Merkle root.
    pub root: String,
    pub event_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub records: usize,
    pub events: u64,
}
