//! Aegis Core: Fundamental types, errors, and wire shapes for the
//! Aegis decentralized identifier registry.

pub mod call;
pub mod error;
pub mod event;
pub mod types;

pub use call::RegistryCall;
pub use error::CoreError;
pub use event::{EventRecord, RegistryEvent};
pub use types::{Did, DidKey, Identity};
