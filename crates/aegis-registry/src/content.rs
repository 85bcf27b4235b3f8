//! Content-addressed storage for DID documents.
//!
//! The registry stores `document_ref` strings without interpreting them.
//! This module supplies the collaborator that produces them: blobs are
//! addressed by their BLAKE3 hash, rendered multibase-style as `z` +
//! base58.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use aegis_crypto::{hash, Hash};

/// Multibase prefix for base58btc.
const MULTIBASE_BASE58: char = 'z';

/// Content-store errors.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content not found: {0}")]
    NotFound(ContentRef),

    #[error("content too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("content corrupted: stored bytes do not hash to {0}")]
    Corrupted(ContentRef),

    #[error("invalid content reference: {0}")]
    InvalidRef(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Address of an immutable blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentRef(Hash);

impl ContentRef {
    /// Address of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(hash(bytes))
    }

    /// Raw BLAKE3 digest.
    pub fn digest(&self) -> &Hash {
        &self.0
    }

    /// Whether `bytes` hash to this reference.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        hash(bytes) == self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MULTIBASE_BASE58, bs58::encode(self.0).into_string())
    }
}

impl FromStr for ContentRef {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(MULTIBASE_BASE58)
            .ok_or_else(|| ContentError::InvalidRef(format!("missing 'z' prefix: {}", s)))?;
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|e| ContentError::InvalidRef(format!("invalid base58: {}", e)))?;
        let digest: Hash = bytes.as_slice().try_into().map_err(|_| {
            ContentError::InvalidRef(format!("expected 32-byte digest, got {}", bytes.len()))
        })?;
        Ok(Self(digest))
    }
}

impl TryFrom<String> for ContentRef {
    type Error = ContentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentRef> for String {
    fn from(r: ContentRef) -> Self {
        r.to_string()
    }
}

/// Content-addressed blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their address. Storing the same bytes
    /// twice returns the same address.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, ContentError>;

    /// Fetch the blob at `content_ref`.
    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, ContentError>;
}

/// In-memory content store, used by tests and embedded hosts.
pub struct MemoryContentStore {
    blobs: DashMap<ContentRef, Vec<u8>>,
    max_blob_bytes: usize,
}

impl MemoryContentStore {
    /// Create a store that rejects blobs larger than `max_blob_bytes`.
    pub fn new(max_blob_bytes: usize) -> Self {
        Self {
            blobs: DashMap::new(),
            max_blob_bytes,
        }
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, ContentError> {
        if bytes.len() > self.max_blob_bytes {
            return Err(ContentError::TooLarge {
                size: bytes.len(),
                max: self.max_blob_bytes,
            });
        }
        let content_ref = ContentRef::of(&bytes);
        self.blobs.entry(content_ref).or_insert(bytes);
        tracing::debug!(%content_ref, "blob stored");
        Ok(content_ref)
    }

    /// Blobs are only ever inserted under their own hash, so there is
    /// nothing to re-verify here.
    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, ContentError> {
        self.blobs
            .get(content_ref)
            .map(|entry| entry.value().clone())
            .ok_or(ContentError::NotFound(*content_ref))
    }
}
