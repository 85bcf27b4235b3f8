use aegis_core::Identity;
use serde::{Deserialize, Serialize};

/// The owner / public-key / document-reference tuple bound to one DID.
///
/// A record exists in the registry map iff its DID has been registered,
/// so there is no separate `exists` flag to keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidRecord {
    /// Principal allowed to mutate this record. Set once, never reassigned.
    pub owner: Identity,
    /// Opaque public-key material.
    pub public_key: String,
    /// Opaque pointer into a content-addressed store.
    pub document_ref: String,
    /// Number of events committed against this key, registration included.
    pub revision: u64,
}

impl DidRecord {
    /// Whether `caller` may mutate this record.
    pub fn is_owned_by(&self, caller: &Identity) -> bool {
        &self.owner == caller
    }

    /// Flatten into the `(owner, public_key, document_ref)` tuple.
    pub fn into_tuple(self) -> (Identity, String, String) {
        (self.owner, self.public_key, self.document_ref)
    }
}
