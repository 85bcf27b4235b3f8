//! Caller authentication for registry calls.
//!
//! A client signs the canonical bytes of a [`RegistryCall`] with its
//! Ed25519 key. The node verifies the signature and derives the caller's
//! [`Identity`] from the public key; only that identity reaches the registry.

use aegis_core::{Identity, RegistryCall};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::hashing::hash;
use crate::keys::{KeyPair, PublicKey};
use crate::signing::{sign, verify, Signature};

/// Number of hash bytes kept in an address-style identity.
const IDENTITY_BYTES: usize = 20;

/// Derive the principal identity of a public key:
/// `0x` + hex of the first 20 bytes of BLAKE3(public key).
pub fn identity_of(public_key: &PublicKey) -> Identity {
    let digest = hash(public_key.as_bytes());
    Identity::new(format!("0x{}", hex::encode(&digest[..IDENTITY_BYTES])))
}

/// A registry call plus the signer's public key and signature, both hex.
///
/// `revision` is the revision of the target record the caller saw when
/// signing (0 for a key that is not registered yet). It is covered by the
/// signature; the host rejects the call once the record has moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: RegistryCall,
    pub revision: u64,
    pub signer: String,
    pub signature: String,
}

impl SignedCall {
    /// Sign a call against `revision` of its target record.
    pub fn sign(
        call: RegistryCall,
        revision: u64,
        keypair: &KeyPair,
    ) -> Result<Self, CryptoError> {
        let payload = call.signing_bytes(revision)?;
        let signature = sign(&payload, keypair);
        Ok(Self {
            call,
            revision,
            signer: keypair.public_key().to_hex(),
            signature: signature.to_hex(),
        })
    }

    /// Verify the signature and return the authenticated caller identity.
    ///
    /// This does not check `revision` against any registry state.
    pub fn authenticate(&self) -> Result<Identity, CryptoError> {
        let public_key = PublicKey::from_hex(&self.signer)?;
        let signature = Signature::from_hex(&self.signature)?;
        let payload = self.call.signing_bytes(self.revision)?;
        verify(&payload, &signature, &public_key)?;
        let identity = identity_of(&public_key);
        tracing::debug!(caller = %identity, op = self.call.op(), "call authenticated");
        Ok(identity)
    }
}
