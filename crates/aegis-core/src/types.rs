use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// URI prefix of every DID minted by Aegis.
pub const DID_PREFIX: &str = "did:aegis:";

/// Opaque 32-byte registry key addressing exactly one DID record.
///
/// Serialized as lowercase hex. Parsing accepts an optional `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DidKey([u8; 32]);

impl DidKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the registry key for a textual identifier (BLAKE3 of its UTF-8 bytes).
    pub fn derive(text: &str) -> Self {
        Self(*blake3::hash(text.as_bytes()).as_bytes())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as lowercase hex (64 characters, no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| CoreError::InvalidKey(format!("invalid hex: {}", e)))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Accept either a `did:aegis:` URI (hashed to its key) or a hex key.
    pub fn parse_reference(input: &str) -> Result<Self, CoreError> {
        if input.starts_with("did:") {
            Ok(Did::new(input)?.key())
        } else {
            Self::from_hex(input)
        }
    }
}

impl fmt::Display for DidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for DidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DidKey({})", self.to_hex())
    }
}

impl FromStr for DidKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for DidKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DidKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Decentralized Identifier in the Aegis namespace.
/// Format: `did:aegis:<identifier>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Did(String);

impl Did {
    /// Parse and validate a full DID URI.
    pub fn new(uri: impl Into<String>) -> Result<Self, CoreError> {
        let uri = uri.into();
        match uri.strip_prefix(DID_PREFIX) {
            Some(id) if !id.is_empty() => Ok(Self(uri)),
            Some(_) => Err(CoreError::InvalidDid(format!(
                "DID identifier must not be empty, got: {}",
                uri
            ))),
            None => Err(CoreError::InvalidDid(format!(
                "DID must start with '{}', got: {}",
                DID_PREFIX, uri
            ))),
        }
    }

    /// Mint a fresh DID with a random UUIDv4 identifier.
    pub fn generate() -> Self {
        Self(format!("{}{}", DID_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Full DID URI.
    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Method-specific identifier (everything after `did:aegis:`).
    pub fn identifier(&self) -> &str {
        &self.0[DID_PREFIX.len()..]
    }

    /// Registry key under which this DID is recorded.
    pub fn key(&self) -> DidKey {
        DidKey::derive(&self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// An authenticated principal as supplied by the hosting environment.
///
/// The registry compares identities by exact string equality and never
/// interprets their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an already-authenticated principal name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a non-empty principal name.
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidIdentity("identity must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
