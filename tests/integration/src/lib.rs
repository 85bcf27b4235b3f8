//! Cross-crate test support for the Aegis workspace.
//!
//! `generators` holds proptest strategies for keys, identities, and whole
//! call sequences against a `DidRegistry`.

pub mod generators;

pub use generators::{apply_op, Op};
