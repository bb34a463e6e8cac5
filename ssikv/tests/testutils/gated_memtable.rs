//! In-memory MemTable that holds each batch until the test releases it

use crossbeam_channel::{Receiver, Sender};
use ssikv::storage::{MemoryMemTable, StorageResult};
use ssikv::{MemTable, StorageType, Timestamp, Value, VersionedKey};

/// Every `apply_batch` blocks until one release token is sent
pub struct GatedMemTable {
    inner: MemoryMemTable,
    tokens: Receiver<()>,
}

impl GatedMemTable {
    /// Returns the table and the sender used to release batches one at a time
    pub fn new() -> (Self, Sender<()>) {
        let (release, tokens) = crossbeam_channel::unbounded();
        (
            Self {
                inner: MemoryMemTable::new(),
                tokens,
            },
            release,
        )
    }
}

impl MemTable for GatedMemTable {
    fn get(&self, key: &VersionedKey) -> StorageResult<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: VersionedKey, value: Value) -> StorageResult<()> {
        self.inner.set(key, value)
    }

    fn apply_batch(&self, entries: Vec<(VersionedKey, Value)>) -> StorageResult<()> {
        // A dropped release sender lets everything through
        let _ = self.tokens.recv();
        self.inner.apply_batch(entries)
    }

    fn versions(&self, key: &[u8]) -> StorageResult<Vec<(Timestamp, Value)>> {
        self.inner.versions(key)
    }

    fn len(&self) -> StorageResult<usize> {
        self.inner.len()
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Memory
    }
}
