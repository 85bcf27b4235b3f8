use std::collections::HashMap;

use aegis_core::{DidKey, EventRecord, Identity, RegistryEvent};
use serde::Serialize;

use crate::error::RegistryError;

/// What an indexer knows about one DID, learned purely from events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub key: DidKey,
    pub owner: Identity,
    /// Latest document reference.
    pub document_ref: String,
    /// Sequence of the `Registered` event.
    pub registered_at: u64,
    /// Sequence of the most recent event touching this key.
    pub last_event: u64,
    /// Number of successful updates after registration.
    pub updates: u64,
}

/// Enumerable view of the registry rebuilt by consuming its event stream.
///
/// The registry itself never lists identifiers; listing is the job of
/// observers such as this one. Events must be ingested in sequence order,
/// and already-seen sequences are skipped so a poller can safely re-read
/// overlapping pages.
#[derive(Debug, Default)]
pub struct EventIndex {
    entries: HashMap<DidKey, IndexEntry>,
    /// Keys in registration order.
    order: Vec<DidKey>,
    next_sequence: u64,
}

impl EventIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a complete log.
    pub fn from_events<'a, I>(records: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut index = Self::new();
        index.ingest_all(records)?;
        Ok(index)
    }

    /// Ingest a batch of events in order.
    pub fn ingest_all<'a, I>(&mut self, records: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        for record in records {
            self.ingest(record)?;
        }
        Ok(())
    }

    /// Ingest one event.
    pub fn ingest(&mut self, record: &EventRecord) -> Result<(), RegistryError> {
        if record.sequence < self.next_sequence {
            return Ok(());
        }
        if record.sequence > self.next_sequence {
            return Err(RegistryError::Replay {
                sequence: record.sequence,
                reason: format!("index expected sequence {}", self.next_sequence),
            });
        }

        let key = *record.event.key();
        match &record.event {
            RegistryEvent::Registered {
                owner,
                document_ref,
                ..
            } => {
                if self.entries.contains_key(&key) {
                    return Err(RegistryError::Replay {
                        sequence: record.sequence,
                        reason: format!("{} registered twice", key),
                    });
                }
                self.entries.insert(
                    key,
                    IndexEntry {
                        key,
                        owner: owner.clone(),
                        document_ref: document_ref.clone(),
                        registered_at: record.sequence,
                        last_event: record.sequence,
                        updates: 0,
                    },
                );
                self.order.push(key);
            }
            RegistryEvent::PublicKeyUpdated { .. } | RegistryEvent::DocumentRefUpdated { .. } => {
                let entry = self.entries.get_mut(&key).ok_or(RegistryError::Replay {
                    sequence: record.sequence,
                    reason: format!("update for unregistered {}", key),
                })?;
                if let RegistryEvent::DocumentRefUpdated { document_ref, .. } = &record.event {
                    entry.document_ref = document_ref.clone();
                }
                entry.last_event = record.sequence;
                entry.updates += 1;
            }
        }

        self.next_sequence += 1;
        Ok(())
    }

    /// All known DIDs, in registration order.
    pub fn entries(&self) -> Vec<&IndexEntry> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .collect()
    }

    /// DIDs owned by `owner`, in registration order.
    pub fn owned_by(&self, owner: &Identity) -> Vec<&IndexEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| &entry.owner == owner)
            .collect()
    }

    /// Look up one DID.
    pub fn get(&self, key: &DidKey) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Sequence to request next when polling for new events.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
