//! Aegis Registry Layer
//!
//! The deterministic state machine at the heart of Aegis:
//! - `DidRegistry`: owner-controlled DID records with an append-only event log
//! - Event-log replay and Merkle audit digests
//! - `EventIndex`: external view rebuilt from the event stream
//! - `ContentStore`: content-addressed storage seam for DID documents

pub mod audit;
pub mod content;
pub mod error;
pub mod index;
pub mod record;
pub mod registry;

pub use audit::audit_root;
pub use content::{ContentError, ContentRef, ContentStore, MemoryContentStore};
pub use error::RegistryError;
pub use index::{EventIndex, IndexEntry};
pub use record::DidRecord;
pub use registry::DidRegistry;
