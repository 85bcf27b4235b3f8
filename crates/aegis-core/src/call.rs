//! Mutating registry calls as they travel from a client to the node.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DidKey;

/// Domain-separation tag prepended to the bytes a caller signs.
pub const CALL_DOMAIN_TAG: &[u8] = b"aegis-registry-call-v1";

/// A mutating registry operation, minus the caller identity.
///
/// The identity is established separately by whoever authenticates the
/// call and is passed to the registry explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryCall {
    Register {
        key: DidKey,
        public_key: String,
        document_ref: String,
    },
    UpdatePublicKey {
        key: DidKey,
        public_key: String,
    },
    UpdateDocumentRef {
        key: DidKey,
        document_ref: String,
    },
}

impl RegistryCall {
    /// Key the call targets.
    pub fn key(&self) -> &DidKey {
        match self {
            Self::Register { key, .. }
            | Self::UpdatePublicKey { key, .. }
            | Self::UpdateDocumentRef { key, .. } => key,
        }
    }

    /// Short operation name for logs.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::UpdatePublicKey { .. } => "update_public_key",
            Self::UpdateDocumentRef { .. } => "update_document_ref",
        }
    }

    /// Bytes covered by the caller's signature: domain tag, the record
    /// revision the call was made against (big-endian), then the JSON
    /// encoding of the call.
    /// A signature is only valid against that one revision of the record.
    pub fn signing_bytes(&self, revision: u64) -> Result<Vec<u8>, CoreError> {
        let body = serde_json::to_vec(self)?;
        let mut out = Vec::with_capacity(CALL_DOMAIN_TAG.len() + 8 + body.len());
        out.extend_from_slice(CALL_DOMAIN_TAG);
        out.extend_from_slice(&revision.to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}
