//! Integration test: authenticated calls, content-addressed documents, and
//! rebuilding a registry from its persisted log.
//!
//! Exercises aegis-crypto and aegis-registry together the way a node does.

use aegis_core::{Did, EventRecord, RegistryCall};
use aegis_crypto::{identity_of, KeyPair, SignedCall};
use aegis_registry::{
    audit_root, ContentError, ContentRef, ContentStore, DidRegistry, EventIndex,
    MemoryContentStore, RegistryError,
};

/// Authenticate a signed call and apply it at its signed revision, the way
/// the node does.
fn submit(reg: &mut DidRegistry, signed: &SignedCall) -> Result<EventRecord, String> {
    let caller = signed.authenticate().map_err(|e| e.to_string())?;
    reg.apply_at(&caller, signed.call.clone(), signed.revision)
        .cloned()
        .map_err(|e| e.to_string())
}

// =========================================================================
// Signed calls
// =========================================================================

#[test]
fn test_signed_register_and_update() {
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let register = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: alice.public_key().to_hex(),
            document_ref: "cid1".into(),
        },
        0,
        &alice,
    )
    .unwrap();
    let record = submit(&mut reg, &register).unwrap();
    assert_eq!(record.sequence, 0);
    assert_eq!(
        reg.get_owner(&did.key()).unwrap(),
        identity_of(&alice.public_key())
    );

    let update = SignedCall::sign(
        RegistryCall::UpdateDocumentRef {
            key: did.key(),
            document_ref: "cid2".into(),
        },
        1,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &update).unwrap();
    assert_eq!(reg.get_document_ref(&did.key()).unwrap(), "cid2");
}

#[test]
fn test_other_signer_is_unauthorized() {
    let alice = KeyPair::generate();
    let mallory = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let register = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: "pk".into(),
            document_ref: "cid".into(),
        },
        0,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &register).unwrap();

    let hijack = SignedCall::sign(
        RegistryCall::UpdatePublicKey {
            key: did.key(),
            public_key: mallory.public_key().to_hex(),
        },
        1,
        &mallory,
    )
    .unwrap();
    let caller = hijack.authenticate().unwrap();
    let err = reg.apply(&caller, hijack.call.clone()).unwrap_err();
    assert!(matches!(err, RegistryError::Unauthorized { .. }));
    assert_eq!(reg.get_public_key(&did.key()).unwrap(), "pk");
}

#[test]
fn test_forged_signer_never_reaches_registry() {
    let alice = KeyPair::generate();
    let mallory = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    // Mallory signs but claims to be alice.
    let mut forged = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: "pk".into(),
            document_ref: "cid".into(),
        },
        0,
        &mallory,
    )
    .unwrap();
    forged.signer = alice.public_key().to_hex();

    assert!(submit(&mut reg, &forged).is_err());
    assert!(!reg.is_registered(&did.key()));
    assert!(reg.events().is_empty());
}

#[test]
fn test_replayed_register_is_rejected() {
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let register = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: "pk".into(),
            document_ref: "cid".into(),
        },
        0,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &register).unwrap();
    assert!(submit(&mut reg, &register).is_err());
    assert_eq!(reg.events().len(), 1);
}

#[test]
fn test_captured_update_cannot_roll_back_rotation() {
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let register = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: "pk1".into(),
            document_ref: "cid1".into(),
        },
        0,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &register).unwrap();

    let rotate = |public_key: &str, revision| {
        SignedCall::sign(
            RegistryCall::UpdatePublicKey {
                key: did.key(),
                public_key: public_key.into(),
            },
            revision,
            &alice,
        )
        .unwrap()
    };

    let captured = rotate("pk_compromised", reg.revision(&did.key()));
    submit(&mut reg, &captured).unwrap();
    let fresh = rotate("pk_fresh", reg.revision(&did.key()));
    submit(&mut reg, &fresh).unwrap();

    let caller = captured.authenticate().unwrap();
    let err = reg
        .apply_at(&caller, captured.call.clone(), captured.revision)
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::StaleRevision {
            key: did.key(),
            expected: 3,
            found: 1,
        }
    );
    assert_eq!(reg.get_public_key(&did.key()).unwrap(), "pk_fresh");
    assert_eq!(reg.events().len(), 3);
}

#[test]
fn test_captured_update_is_stale_after_document_change() {
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();
    reg.register(&identity_of(&alice.public_key()), did.key(), "pk1", "cid1")
        .unwrap();

    let captured = SignedCall::sign(
        RegistryCall::UpdatePublicKey {
            key: did.key(),
            public_key: "pk2".into(),
        },
        1,
        &alice,
    )
    .unwrap();
    let doc = SignedCall::sign(
        RegistryCall::UpdateDocumentRef {
            key: did.key(),
            document_ref: "cid2".into(),
        },
        1,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &doc).unwrap();

    assert!(submit(&mut reg, &captured).is_err());
    assert_eq!(reg.get_public_key(&did.key()).unwrap(), "pk1");
}

#[test]
fn test_signed_call_json_roundtrip_still_verifies() {
    let alice = KeyPair::generate();
    let signed = SignedCall::sign(
        RegistryCall::UpdatePublicKey {
            key: Did::generate().key(),
            public_key: "pk".into(),
        },
        1,
        &alice,
    )
    .unwrap();

    let wire = serde_json::to_string(&signed).unwrap();
    let received: SignedCall = serde_json::from_str(&wire).unwrap();
    assert_eq!(
        received.authenticate().unwrap(),
        identity_of(&alice.public_key())
    );
}

// =========================================================================
// Documents in the content store
// =========================================================================

#[tokio::test]
async fn test_document_ref_points_at_stored_document() {
    let store = MemoryContentStore::new(4096);
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let document = serde_json::json!({
        "id": did.uri(),
        "verificationMethod": [{ "publicKeyHex": alice.public_key().to_hex() }],
    });
    let content_ref = store
        .put(serde_json::to_vec(&document).unwrap())
        .await
        .unwrap();

    let register = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: alice.public_key().to_hex(),
            document_ref: content_ref.to_string(),
        },
        0,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &register).unwrap();

    let stored_ref: ContentRef = reg.get_document_ref(&did.key()).unwrap().parse().unwrap();
    let fetched: serde_json::Value =
        serde_json::from_slice(&store.get(&stored_ref).await.unwrap()).unwrap();
    assert_eq!(fetched, document);
}

#[tokio::test]
async fn test_unknown_document_ref() {
    let store = MemoryContentStore::new(16);
    let missing = ContentRef::of(b"nothing here");
    assert!(matches!(
        store.get(&missing).await,
        Err(ContentError::NotFound(_))
    ));
}

// =========================================================================
// Persistence: replay and audit
// =========================================================================

#[test]
fn test_replay_through_json_matches_live_registry() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let mut reg = DidRegistry::new();

    for signer in [&alice, &bob, &alice] {
        let signed = SignedCall::sign(
            RegistryCall::Register {
                key: Did::generate().key(),
                public_key: signer.public_key().to_hex(),
                document_ref: String::new(),
            },
            0,
            signer,
        )
        .unwrap();
        submit(&mut reg, &signed).unwrap();
    }

    // Persist and reload the log as the node does.
    let persisted: Vec<Vec<u8>> = reg
        .events()
        .iter()
        .map(|r| r.to_bytes().unwrap())
        .collect();
    let loaded: Vec<EventRecord> = persisted
        .iter()
        .map(|b| EventRecord::from_bytes(b).unwrap())
        .collect();

    let restored = DidRegistry::replay(loaded).unwrap();
    assert_eq!(restored.record_count(), 3);
    assert_eq!(restored.audit_root().unwrap(), reg.audit_root().unwrap());

    let index = EventIndex::from_events(restored.events()).unwrap();
    assert_eq!(index.owned_by(&identity_of(&alice.public_key())).len(), 2);
}

#[test]
fn test_tampered_log_is_detected() {
    let alice = KeyPair::generate();
    let did = Did::generate();
    let mut reg = DidRegistry::new();

    let signed = SignedCall::sign(
        RegistryCall::Register {
            key: did.key(),
            public_key: "pk".into(),
            document_ref: "cid".into(),
        },
        0,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &signed).unwrap();
    let update = SignedCall::sign(
        RegistryCall::UpdatePublicKey {
            key: did.key(),
            public_key: "pk2".into(),
        },
        1,
        &alice,
    )
    .unwrap();
    submit(&mut reg, &update).unwrap();

    // Dropping an event breaks the sequence.
    let gapped = vec![reg.events()[1].clone()];
    assert!(matches!(
        DidRegistry::replay(gapped),
        Err(RegistryError::Replay { sequence: 1, .. })
    ));

    // Rewriting an event changes the audit root.
    let mut rewritten = reg.events().to_vec();
    if let aegis_core::RegistryEvent::PublicKeyUpdated { public_key, .. } =
        &mut rewritten[1].event
    {
        *public_key = "evil".into();
    }
    assert_ne!(
        audit_root(&rewritten).unwrap(),
        reg.audit_root().unwrap()
    );
}
