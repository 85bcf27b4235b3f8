//! Proptest generators for property-based testing.

use proptest::prelude::*;

use aegis_core::{DidKey, Identity};
use aegis_registry::{DidRegistry, RegistryError};

/// Small pool of principals so generated calls collide on ownership.
pub const PRINCIPALS: [&str; 3] = ["alice", "bob", "carol"];

/// Generate an arbitrary registry key.
pub fn did_key() -> impl Strategy<Value = DidKey> {
    any::<[u8; 32]>().prop_map(DidKey::from_bytes)
}

/// Generate one of a handful of keys, so operations hit the same records.
pub fn pooled_key() -> impl Strategy<Value = DidKey> {
    (0u8..4).prop_map(|n| DidKey::from_bytes([n; 32]))
}

/// Generate one of the pooled principals.
pub fn identity() -> impl Strategy<Value = Identity> {
    prop::sample::select(PRINCIPALS.to_vec()).prop_map(Identity::new)
}

/// Generate an opaque field value (public key material or document ref).
pub fn field_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:]{0,24}".prop_map(String::from)
}

/// One mutating call against the registry.
#[derive(Debug, Clone)]
pub enum Op {
    Register {
        caller: Identity,
        key: DidKey,
        public_key: String,
        document_ref: String,
    },
    UpdatePublicKey {
        caller: Identity,
        key: DidKey,
        value: String,
    },
    UpdateDocumentRef {
        caller: Identity,
        key: DidKey,
        value: String,
    },
}

impl Op {
    pub fn caller(&self) -> &Identity {
        match self {
            Self::Register { caller, .. }
            | Self::UpdatePublicKey { caller, .. }
            | Self::UpdateDocumentRef { caller, .. } => caller,
        }
    }

    pub fn key(&self) -> &DidKey {
        match self {
            Self::Register { key, .. }
            | Self::UpdatePublicKey { key, .. }
            | Self::UpdateDocumentRef { key, .. } => key,
        }
    }
}

impl Arbitrary for Op {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            (identity(), pooled_key(), field_value(), field_value()).prop_map(
                |(caller, key, public_key, document_ref)| Op::Register {
                    caller,
                    key,
                    public_key,
                    document_ref,
                }
            ),
            (identity(), pooled_key(), field_value())
                .prop_map(|(caller, key, value)| Op::UpdatePublicKey { caller, key, value }),
            (identity(), pooled_key(), field_value())
                .prop_map(|(caller, key, value)| Op::UpdateDocumentRef { caller, key, value }),
        ]
        .boxed()
    }
}

/// Generate a sequence of up to `max_len` operations.
pub fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=max_len)
}

/// Apply one generated operation.
pub fn apply_op(registry: &mut DidRegistry, op: &Op) -> Result<(), RegistryError> {
    match op {
        Op::Register {
            caller,
            key,
            public_key,
            document_ref,
        } => registry.register(caller, *key, public_key.as_str(), document_ref.as_str()),
        Op::UpdatePublicKey { caller, key, value } => {
            registry.update_public_key(caller, *key, value.as_str())
        }
        Op::UpdateDocumentRef { caller, key, value } => {
            registry.update_document_ref(caller, *key, value.as_str())
        }
    }
}
