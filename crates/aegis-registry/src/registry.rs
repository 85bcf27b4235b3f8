use std::collections::hash_map::Entry;
use std::collections::HashMap;

use aegis_core::{DidKey, EventRecord, Identity, RegistryCall, RegistryEvent};

use crate::error::RegistryError;
use crate::record::DidRecord;

/// Owner-controlled DID registry.
///
/// Every mutation is checked against the record's existence and owner,
/// applied in full or not at all, and appended to an ordered event log.
/// Mutating methods take `&mut self`; the host is responsible for feeding
/// calls in one at a time.
#[derive(Debug, Default)]
pub struct DidRegistry {
    /// DID key -> record. Absence means "never registered".
    records: HashMap<DidKey, DidRecord>,
    /// Append-only audit log, indexed by sequence number.
    events: Vec<EventRecord>,
}

impl DidRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry by re-applying a persisted event log.
    ///
    /// Each event goes through the same validation as a live call, acting
    /// as its recorded owner. Sequence numbers must start at 0 and be
    /// gap-free.
    pub fn replay<I>(records: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = EventRecord>,
    {
        let mut registry = Self::new();

        for record in records {
            let expected = registry.next_sequence();
            if record.sequence != expected {
                return Err(RegistryError::Replay {
                    sequence: record.sequence,
                    reason: format!("expected sequence {}", expected),
                });
            }

            let sequence = record.sequence;
            let result = match record.event {
                RegistryEvent::Registered {
                    key,
                    owner,
                    public_key,
                    document_ref,
                } => registry.register(&owner, key, public_key, document_ref),
                RegistryEvent::PublicKeyUpdated {
                    key,
                    owner,
                    public_key,
                } => registry.update_public_key(&owner, key, public_key),
                RegistryEvent::DocumentRefUpdated {
                    key,
                    owner,
                    document_ref,
                } => registry.update_document_ref(&owner, key, document_ref),
            };

            result.map_err(|e| RegistryError::Replay {
                sequence,
                reason: e.to_string(),
            })?;
        }

        tracing::debug!(
            events = registry.events.len(),
            records = registry.records.len(),
            "registry replayed"
        );

        Ok(registry)
    }

    /// Create a record owned by `caller`.
    ///
    /// Fails with `AlreadyRegistered` if the key has ever been registered,
    /// regardless of who is asking.
    pub fn register(
        &mut self,
        caller: &Identity,
        key: DidKey,
        public_key: impl Into<String>,
        document_ref: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.commit_register(caller, key, public_key.into(), document_ref.into())
            .map(|_| ())
    }

    /// Replace the public-key material of a record owned by `caller`.
    pub fn update_public_key(
        &mut self,
        caller: &Identity,
        key: DidKey,
        new_public_key: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.commit_public_key(caller, key, new_public_key.into())
            .map(|_| ())
    }

    /// Replace the document reference of a record owned by `caller`.
    pub fn update_document_ref(
        &mut self,
        caller: &Identity,
        key: DidKey,
        new_document_ref: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.commit_document_ref(caller, key, new_document_ref.into())
            .map(|_| ())
    }

    /// Dispatch an authenticated call and return the event it produced.
    pub fn apply(
        &mut self,
        caller: &Identity,
        call: RegistryCall,
    ) -> Result<&EventRecord, RegistryError> {
        match call {
            RegistryCall::Register {
                key,
                public_key,
                document_ref,
            } => self.commit_register(caller, key, public_key, document_ref),
            RegistryCall::UpdatePublicKey { key, public_key } => {
                self.commit_public_key(caller, key, public_key)
            }
            RegistryCall::UpdateDocumentRef { key, document_ref } => {
                self.commit_document_ref(caller, key, document_ref)
            }
        }
    }

    /// Apply a call that was signed against `revision` of its target record.
    ///
    /// A registered key only accepts updates carrying its current revision,
    /// and an unregistered key only accepts a `Register` at revision 0, so a
    /// captured call cannot be replayed once anything else has happened to
    /// the key. Existence and ownership errors take precedence.
    pub fn apply_at(
        &mut self,
        caller: &Identity,
        call: RegistryCall,
        revision: u64,
    ) -> Result<&EventRecord, RegistryError> {
        let key = *call.key();
        let registered = self.is_registered(&key);
        let bound = match &call {
            RegistryCall::Register { .. } => !registered,
            _ => registered && self.lookup(&key)?.is_owned_by(caller),
        };

        let expected = self.revision(&key);
        if bound && revision != expected {
            tracing::debug!(
                %key,
                %caller,
                expected,
                found = revision,
                "call rejected: stale revision"
            );
            return Err(RegistryError::StaleRevision {
                key,
                expected,
                found: revision,
            });
        }

        self.apply(caller, call)
    }

    /// Current revision of a key: 0 if unregistered, otherwise the number
    /// of events committed against it.
    pub fn revision(&self, key: &DidKey) -> u64 {
        self.records.get(key).map_or(0, |record| record.revision)
    }

    /// Owner of a registered DID.
    pub fn get_owner(&self, key: &DidKey) -> Result<Identity, RegistryError> {
        Ok(self.lookup(key)?.owner.clone())
    }

    /// Public-key material of a registered DID.
    pub fn get_public_key(&self, key: &DidKey) -> Result<String, RegistryError> {
        Ok(self.lookup(key)?.public_key.clone())
    }

    /// Document reference of a registered DID.
    pub fn get_document_ref(&self, key: &DidKey) -> Result<String, RegistryError> {
        Ok(self.lookup(key)?.document_ref.clone())
    }

    /// `(owner, public_key, document_ref)` of a registered DID.
    pub fn get_record(&self, key: &DidKey) -> Result<(Identity, String, String), RegistryError> {
        Ok(self.lookup(key)?.clone().into_tuple())
    }

    /// Whether the key has been registered. Total over all keys.
    pub fn is_registered(&self, key: &DidKey) -> bool {
        self.records.contains_key(key)
    }

    /// Number of registered DIDs.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// The full event log, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Events with `sequence >= since`.
    pub fn events_since(&self, since: u64) -> &[EventRecord] {
        let start = usize::try_from(since)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Sequence number the next event will receive.
    pub fn next_sequence(&self) -> u64 {
        self.events.len() as u64
    }

    fn lookup(&self, key: &DidKey) -> Result<&DidRecord, RegistryError> {
        self.records
            .get(key)
            .ok_or(RegistryError::NotFound(*key))
    }

    fn commit_register(
        &mut self,
        caller: &Identity,
        key: DidKey,
        public_key: String,
        document_ref: String,
    ) -> Result<&EventRecord, RegistryError> {
        let record = match self.records.entry(key) {
            Entry::Occupied(_) => {
                tracing::debug!(%key, %caller, "register rejected: already registered");
                return Err(RegistryError::AlreadyRegistered(key));
            }
            Entry::Vacant(slot) => slot.insert(DidRecord {
                owner: caller.clone(),
                public_key,
                document_ref,
                revision: 1,
            }),
        };

        let event = RegistryEvent::Registered {
            key,
            owner: record.owner.clone(),
            public_key: record.public_key.clone(),
            document_ref: record.document_ref.clone(),
        };

        tracing::info!(%key, owner = %caller, "DID registered");
        Ok(self.append(event))
    }

    fn commit_public_key(
        &mut self,
        caller: &Identity,
        key: DidKey,
        public_key: String,
    ) -> Result<&EventRecord, RegistryError> {
        let record = self.owned_record_mut(caller, key)?;
        record.public_key = public_key;
        record.revision += 1;
        let event = RegistryEvent::PublicKeyUpdated {
            key,
            owner: record.owner.clone(),
            public_key: record.public_key.clone(),
        };

        tracing::info!(%key, owner = %caller, "public key updated");
        Ok(self.append(event))
    }

    fn commit_document_ref(
        &mut self,
        caller: &Identity,
        key: DidKey,
        document_ref: String,
    ) -> Result<&EventRecord, RegistryError> {
        let record = self.owned_record_mut(caller, key)?;
        record.document_ref = document_ref;
        record.revision += 1;
        let event = RegistryEvent::DocumentRefUpdated {
            key,
            owner: record.owner.clone(),
            document_ref: record.document_ref.clone(),
        };

        tracing::info!(%key, owner = %caller, "document ref updated");
        Ok(self.append(event))
    }

    /// Existence is checked before ownership.
    fn owned_record_mut(
        &mut self,
        caller: &Identity,
        key: DidKey,
    ) -> Result<&mut DidRecord, RegistryError> {
        let record = self
            .records
            .get_mut(&key)
            .ok_or(RegistryError::NotFound(key))?;

        if !record.is_owned_by(caller) {
            tracing::debug!(%key, %caller, owner = %record.owner, "update rejected: not owner");
            return Err(RegistryError::Unauthorized {
                key,
                caller: caller.clone(),
            });
        }

        Ok(record)
    }

    fn append(&mut self, event: RegistryEvent) -> &EventRecord {
        let sequence = self.next_sequence();
        self.events.push(EventRecord { sequence, event });
        &self.events[self.events.len() - 1]
    }
}
