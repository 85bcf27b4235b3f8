//! Property tests for the registry invariants over arbitrary call sequences.

use proptest::prelude::*;

use aegis_core::{DidKey, Identity};
use aegis_integration_tests::generators::{did_key, field_value, identity, ops};
use aegis_integration_tests::{apply_op, Op};
use aegis_registry::{DidRegistry, RegistryError};

/// Snapshot of everything a reader can observe for one key.
fn observe(reg: &DidRegistry, key: &DidKey) -> (bool, Option<(Identity, String, String)>) {
    (reg.is_registered(key), reg.get_record(key).ok())
}

proptest! {
    #[test]
    fn reads_are_idempotent(history in ops(24), key in did_key()) {
        let mut reg = DidRegistry::new();
        for op in &history {
            let _ = apply_op(&mut reg, op);
        }
        let events_before = reg.events().len();

        let first = observe(&reg, &key);
        let second = observe(&reg, &key);
        prop_assert_eq!(first, second);
        prop_assert_eq!(reg.get_owner(&key), reg.get_owner(&key));
        prop_assert_eq!(reg.events().len(), events_before);
    }

    #[test]
    fn second_registration_always_fails(
        history in ops(24),
        caller in identity(),
        pk in field_value(),
        cid in field_value(),
    ) {
        let mut reg = DidRegistry::new();
        for op in &history {
            let _ = apply_op(&mut reg, op);
        }

        for op in &history {
            let key = *op.key();
            if reg.is_registered(&key) {
                let before = reg.get_record(&key).unwrap();
                let result = reg.register(&caller, key, pk.as_str(), cid.as_str());
                prop_assert_eq!(result, Err(RegistryError::AlreadyRegistered(key)));
                prop_assert_eq!(reg.get_record(&key).unwrap(), before);
            }
        }
    }

    #[test]
    fn owner_never_changes(history in ops(32)) {
        let mut reg = DidRegistry::new();
        let mut first_owner = std::collections::HashMap::new();

        for op in &history {
            let _ = apply_op(&mut reg, op);
            let key = *op.key();
            if let Ok(owner) = reg.get_owner(&key) {
                let recorded = first_owner.entry(key).or_insert_with(|| owner.clone());
                prop_assert_eq!(&*recorded, &owner);
            }
        }
    }

    #[test]
    fn only_owner_mutates(history in ops(32)) {
        let mut reg = DidRegistry::new();

        for op in &history {
            let key = *op.key();
            let before = reg.get_record(&key).ok();
            let events_before = reg.events().len();
            let result = apply_op(&mut reg, op);

            match (&before, op) {
                (Some((owner, _, _)), Op::UpdatePublicKey { .. } | Op::UpdateDocumentRef { .. })
                    if owner != op.caller() =>
                {
                    prop_assert_eq!(
                        result,
                        Err(RegistryError::Unauthorized { key, caller: op.caller().clone() })
                    );
                    prop_assert_eq!(reg.get_record(&key).ok(), before.clone());
                    prop_assert_eq!(reg.events().len(), events_before);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn unregistered_updates_are_not_found(history in ops(24), op in any::<Op>()) {
        let mut reg = DidRegistry::new();
        for prior in &history {
            let _ = apply_op(&mut reg, prior);
        }

        let key = *op.key();
        if !reg.is_registered(&key) && !matches!(op, Op::Register { .. }) {
            prop_assert_eq!(apply_op(&mut reg, &op), Err(RegistryError::NotFound(key)));
            prop_assert!(!reg.is_registered(&key));
        }
    }

    #[test]
    fn one_event_per_success(history in ops(32)) {
        let mut reg = DidRegistry::new();
        let mut successes = 0u64;

        for op in &history {
            if apply_op(&mut reg, op).is_ok() {
                successes += 1;
                let last = reg.events().last().unwrap();
                prop_assert_eq!(last.sequence, successes - 1);
                prop_assert_eq!(last.event.key(), op.key());
                prop_assert_eq!(last.event.owner(), op.caller());
            }
        }
        prop_assert_eq!(reg.next_sequence(), successes);
    }

    #[test]
    fn replay_reproduces_state(history in ops(32)) {
        let mut reg = DidRegistry::new();
        for op in &history {
            let _ = apply_op(&mut reg, op);
        }

        let restored = DidRegistry::replay(reg.events().to_vec()).unwrap();
        prop_assert_eq!(restored.events(), reg.events());
        prop_assert_eq!(restored.audit_root().unwrap(), reg.audit_root().unwrap());
        for op in &history {
            prop_assert_eq!(observe(&restored, op.key()), observe(&reg, op.key()));
            prop_assert_eq!(restored.revision(op.key()), reg.revision(op.key()));
        }
    }

    #[test]
    fn revision_counts_events_on_key(history in ops(32)) {
        let mut reg = DidRegistry::new();
        for op in &history {
            let _ = apply_op(&mut reg, op);
        }

        for op in &history {
            let touching = reg
                .events()
                .iter()
                .filter(|r| r.event.key() == op.key())
                .count() as u64;
            prop_assert_eq!(reg.revision(op.key()), touching);
        }
    }
}
