//! Integration test: the registry lifecycle end to end.
//!
//! Walks one DID through registration, a rejected takeover, an owner update,
//! a rejected non-owner update, and lookups of an unknown key.

use aegis_core::{Did, DidKey, Identity, RegistryEvent};
use aegis_registry::{DidRegistry, EventIndex, RegistryError};

fn alice() -> Identity {
    Identity::new("alice")
}

fn bob() -> Identity {
    Identity::new("bob")
}

fn k1() -> DidKey {
    DidKey::derive("did:aegis:k1")
}

fn k2() -> DidKey {
    DidKey::derive("did:aegis:k2")
}

/// Registry with K1 registered by alice.
fn registered() -> DidRegistry {
    let mut reg = DidRegistry::new();
    reg.register(&alice(), k1(), "pk1", "cid1")
        .expect("registration should succeed");
    reg
}

// =========================================================================
// Lifecycle
// =========================================================================

#[test]
fn test_register_then_read_record() {
    let reg = registered();

    assert!(reg.is_registered(&k1()));
    assert_eq!(
        reg.get_record(&k1()).unwrap(),
        (alice(), "pk1".to_string(), "cid1".to_string())
    );
    assert_eq!(reg.get_owner(&k1()).unwrap(), alice());
    assert_eq!(reg.get_public_key(&k1()).unwrap(), "pk1");
    assert_eq!(reg.get_document_ref(&k1()).unwrap(), "cid1");
}

#[test]
fn test_second_registration_rejected() {
    let mut reg = registered();

    let err = reg.register(&bob(), k1(), "pk2", "cid2").unwrap_err();
    assert_eq!(err, RegistryError::AlreadyRegistered(k1()));
    assert_eq!(
        reg.get_record(&k1()).unwrap(),
        (alice(), "pk1".to_string(), "cid1".to_string())
    );
    assert_eq!(reg.events().len(), 1);
}

#[test]
fn test_owner_updates_public_key() {
    let mut reg = registered();

    reg.update_public_key(&alice(), k1(), "pk2").unwrap();
    assert_eq!(reg.get_public_key(&k1()).unwrap(), "pk2");
    assert_eq!(reg.get_owner(&k1()).unwrap(), alice());
    assert_eq!(reg.get_document_ref(&k1()).unwrap(), "cid1");
}

#[test]
fn test_non_owner_update_rejected() {
    let mut reg = registered();

    let err = reg.update_document_ref(&bob(), k1(), "cidX").unwrap_err();
    assert_eq!(
        err,
        RegistryError::Unauthorized {
            key: k1(),
            caller: bob(),
        }
    );
    assert_eq!(reg.get_document_ref(&k1()).unwrap(), "cid1");
    assert_eq!(reg.events().len(), 1);
}

#[test]
fn test_unknown_key_reads() {
    let reg = registered();

    assert_eq!(
        reg.get_owner(&k2()).unwrap_err(),
        RegistryError::NotFound(k2())
    );
    assert!(!reg.is_registered(&k2()));
    assert!(matches!(
        reg.get_record(&k2()),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn test_not_found_beats_unauthorized() {
    let mut reg = registered();

    // bob owns nothing and K2 does not exist: the answer is NotFound.
    assert_eq!(
        reg.update_public_key(&bob(), k2(), "pk").unwrap_err(),
        RegistryError::NotFound(k2())
    );
    assert_eq!(
        reg.update_document_ref(&bob(), k2(), "cid").unwrap_err(),
        RegistryError::NotFound(k2())
    );
}

#[test]
fn test_zero_key_is_ordinary() {
    let zero = DidKey::from_bytes([0u8; 32]);
    let mut reg = DidRegistry::new();

    assert!(!reg.is_registered(&zero));
    reg.register(&alice(), zero, "pk", "cid").unwrap();
    assert!(reg.is_registered(&zero));
    assert_eq!(reg.get_owner(&zero).unwrap(), alice());
}

#[test]
fn test_empty_values_are_accepted() {
    let mut reg = DidRegistry::new();
    reg.register(&alice(), k1(), "", "").unwrap();
    assert_eq!(reg.get_public_key(&k1()).unwrap(), "");
    reg.update_document_ref(&alice(), k1(), "").unwrap();
    assert_eq!(reg.events().len(), 2);
}

// =========================================================================
// Event stream
// =========================================================================

#[test]
fn test_full_lifecycle_event_stream() {
    let mut reg = registered();
    let _ = reg.register(&bob(), k1(), "pk2", "cid2");
    reg.update_public_key(&alice(), k1(), "pk2").unwrap();
    let _ = reg.update_document_ref(&bob(), k1(), "cidX");
    let _ = reg.get_owner(&k2());

    let events = reg.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence, 0);
    assert_eq!(events[1].sequence, 1);
    assert_eq!(
        events[0].event,
        RegistryEvent::Registered {
            key: k1(),
            owner: alice(),
            public_key: "pk1".into(),
            document_ref: "cid1".into(),
        }
    );
    assert_eq!(
        events[1].event,
        RegistryEvent::PublicKeyUpdated {
            key: k1(),
            owner: alice(),
            public_key: "pk2".into(),
        }
    );
}

#[test]
fn test_discovery_through_events_only() {
    let mut reg = DidRegistry::new();
    let dids: Vec<Did> = (0..3).map(|_| Did::generate()).collect();
    for did in &dids {
        reg.register(&alice(), did.key(), "pk", "cid").unwrap();
    }
    reg.register(&bob(), k2(), "pk", "cid").unwrap();

    let index = EventIndex::from_events(reg.events()).unwrap();
    let alice_keys: Vec<DidKey> = index
        .owned_by(&alice())
        .iter()
        .map(|entry| entry.key)
        .collect();
    let expected: Vec<DidKey> = dids.iter().map(Did::key).collect();
    assert_eq!(alice_keys, expected);
    assert_eq!(index.owned_by(&bob()).len(), 1);
}
