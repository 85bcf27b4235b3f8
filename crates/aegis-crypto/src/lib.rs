pub mod auth;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod signing;

pub use auth::{identity_of, SignedCall};
pub use error::CryptoError;
pub use hashing::{hash, merkle_root, Hash};
pub use keys::{KeyPair, PublicKey};
pub use signing::{sign, verify, Signature};
