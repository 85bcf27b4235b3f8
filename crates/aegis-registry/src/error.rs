use aegis_core::{DidKey, Identity};

/// Registry errors.
///
/// None of these are transient: the caller must change the request, not
/// retry it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("DID already registered: {0}")]
    AlreadyRegistered(DidKey),

    #[error("DID not found: {0}")]
    NotFound(DidKey),

    #[error("caller {caller} is not the owner of {key}")]
    Unauthorized { key: DidKey, caller: Identity },

    #[error("stale call for {key}: signed against revision {found}, record is at {expected}")]
    StaleRevision {
        key: DidKey,
        expected: u64,
        found: u64,
    },

    #[error("event log replay failed at sequence {sequence}: {reason}")]
    Replay { sequence: u64, reason: String },
}
