//! Merkle digest over the event log.
//!
//! Two parties holding the same log compute the same root, so comparing
//! roots is enough to detect divergent or rewritten history.

use aegis_core::{CoreError, EventRecord};
use aegis_crypto::{merkle_root, Hash};

use crate::registry::DidRegistry;

/// Merkle root of the BLAKE3 digests of `records`, in order.
/// An empty log yields the zero hash.
pub fn audit_root(records: &[EventRecord]) -> Result<Hash, CoreError> {
    let leaves = records
        .iter()
        .map(EventRecord::digest)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merkle_root(&leaves))
}

impl DidRegistry {
    /// Merkle root over this registry's full event log.
    pub fn audit_root(&self) -> Result<Hash, CoreError> {
        audit_root(self.events())
    }
}
