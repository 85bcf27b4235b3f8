//! RocksDB storage backend for the Aegis node.

use aegis_core::EventRecord;
use aegis_registry::{ContentError, ContentRef, ContentStore};
use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Column family names for different data types.
const CF_EVENTS: &str = "events";
const CF_CONTENT: &str = "content";
const CF_STATE: &str = "state";

/// RocksDB-backed storage for the Aegis node.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CONTENT, Options::default()),
            ColumnFamilyDescriptor::new(CF_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    /// Put a value into a column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Get a value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let value = self.db.get_cf(&cf, key)?;
        Ok(value)
    }

    /// Append an event record. Keys are big-endian sequence numbers, so
    /// RocksDB's byte order is log order.
    pub fn append_event(&self, record: &EventRecord) -> Result<()> {
        let existing = self.get(CF_EVENTS, &record.sequence.to_be_bytes())?;
        if existing.is_some() {
            anyhow::bail!("event {} already persisted", record.sequence);
        }
        self.put(CF_EVENTS, &record.sequence.to_be_bytes(), &record.to_bytes()?)
    }

    /// Load the full event log in sequence order.
    pub fn load_events(&self) -> Result<Vec<EventRecord>> {
        let cf = self
            .db
            .cf_handle(CF_EVENTS)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", CF_EVENTS))?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(EventRecord::from_bytes(&value)?);
        }
        Ok(records)
    }

    /// Store a content blob.
    pub fn put_blob(&self, content_ref: &ContentRef, data: &[u8]) -> Result<()> {
        self.put(CF_CONTENT, content_ref.digest(), data)
    }

    /// Get a content blob.
    pub fn get_blob(&self, content_ref: &ContentRef) -> Result<Option<Vec<u8>>> {
        self.get(CF_CONTENT, content_ref.digest())
    }

    /// Store node state.
    pub fn put_state(&self, key: &str, data: &[u8]) -> Result<()> {
        self.put(CF_STATE, key.as_bytes(), data)
    }

    /// Get node state.
    pub fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get(CF_STATE, key.as_bytes())
    }
}

/// Content store persisted in the node's RocksDB `content` column family.
pub struct RocksContentStore {
    storage: Arc<Storage>,
    max_blob_bytes: usize,
}

impl RocksContentStore {
    pub fn new(storage: Arc<Storage>, max_blob_bytes: usize) -> Self {
        Self {
            storage,
            max_blob_bytes,
        }
    }
}

#[async_trait]
impl ContentStore for RocksContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentRef, ContentError> {
        if bytes.len() > self.max_blob_bytes {
            return Err(ContentError::TooLarge {
                size: bytes.len(),
                max: self.max_blob_bytes,
            });
        }
        let content_ref = ContentRef::of(&bytes);
        self.storage
            .put_blob(&content_ref, &bytes)
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        tracing::debug!(%content_ref, bytes = bytes.len(), "blob stored");
        Ok(content_ref)
    }

    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>, ContentError> {
        let bytes = self
            .storage
            .get_blob(content_ref)
            .map_err(|e| ContentError::Backend(e.to_string()))?
            .ok_or(ContentError::NotFound(*content_ref))?;
        if !content_ref.matches(&bytes) {
            tracing::warn!(%content_ref, "stored blob failed hash check");
            return Err(ContentError::Corrupted(*content_ref));
        }
        Ok(bytes)
    }
}
