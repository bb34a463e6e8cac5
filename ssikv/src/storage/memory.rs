// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory MemTable implementation

use super::key::{Timestamp, VersionedKey};
use super::traits::MemTable;
use super::types::{StorageResult, StorageType, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound::Included;

/// Ordered in-memory versioned store
#[derive(Default)]
pub struct MemoryMemTable {
    data: RwLock<BTreeMap<VersionedKey, Value>>,
}

impl MemoryMemTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemTable for MemoryMemTable {
    fn get(&self, key: &VersionedKey) -> StorageResult<Option<Value>> {
        let data = self.data.read();
        let lower = VersionedKey::first_version_of(key.key());
        let found = data
            .range((Included(lower), Included(key.clone())))
            .next_back()
            .filter(|(stored, _)| stored.is_version_of(key.key()))
            .map(|(_, value)| value.clone());
        Ok(found)
    }

    fn set(&self, key: VersionedKey, value: Value) -> StorageResult<()> {
        self.data.write().insert(key, value);
        Ok(())
    }

    fn apply_batch(&self, entries: Vec<(VersionedKey, Value)>) -> StorageResult<()> {
        let mut data = self.data.write();
        for (key, value) in entries {
            data.insert(key, value);
        }
        Ok(())
    }

    fn versions(&self, key: &[u8]) -> StorageResult<Vec<(Timestamp, Value)>> {
        let data = self.data.read();
        let lower = VersionedKey::first_version_of(key);
        let upper = VersionedKey::new(key.to_vec(), Timestamp::MAX);
        Ok(data
            .range((Included(lower), Included(upper)))
            .map(|(stored, value)| (stored.version(), value.clone()))
            .collect())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.data.read().len())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Memory
    }
}
