use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::types::{DidKey, Identity};

/// A committed change to the registry.
///
/// Every successful mutation produces exactly one event carrying the
/// affected key, the acting owner, and the new field value(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// A new record was created.
    Registered {
        key: DidKey,
        owner: Identity,
        public_key: String,
        document_ref: String,
    },
    /// The owner replaced the public-key material.
    PublicKeyUpdated {
        key: DidKey,
        owner: Identity,
        public_key: String,
    },
    /// The owner replaced the document reference.
    DocumentRefUpdated {
        key: DidKey,
        owner: Identity,
        document_ref: String,
    },
}

impl RegistryEvent {
    /// Key of the affected record.
    pub fn key(&self) -> &DidKey {
        match self {
            Self::Registered { key, .. }
            | Self::PublicKeyUpdated { key, .. }
            | Self::DocumentRefUpdated { key, .. } => key,
        }
    }

    /// Owner that performed the change.
    pub fn owner(&self) -> &Identity {
        match self {
            Self::Registered { owner, .. }
            | Self::PublicKeyUpdated { owner, .. }
            | Self::DocumentRefUpdated { owner, .. } => owner,
        }
    }
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { .. } => write!(f, "Registered"),
            Self::PublicKeyUpdated { .. } => write!(f, "PublicKeyUpdated"),
            Self::DocumentRefUpdated { .. } => write!(f, "DocumentRefUpdated"),
        }
    }
}

/// An event together with its position in the append-only log.
///
/// Sequence numbers start at 0 and are gap-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: RegistryEvent,
}

impl EventRecord {
    /// Canonical JSON encoding, as persisted and hashed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a record previously produced by [`EventRecord::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// BLAKE3 digest of the canonical encoding.
    pub fn digest(&self) -> Result<[u8; 32], CoreError> {
        Ok(*blake3::hash(&self.to_bytes()?).as_bytes())
    }
}
