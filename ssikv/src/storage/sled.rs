// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled MemTable implementation
//!
//! Versioned keys are stored as `raw key ++ version (big-endian u64)`, values as
//! bincode-encoded [`Value`]s. Big-endian versions keep all versions of a raw
//! key adjacent and ascending in sled's byte order.

use super::key::{Timestamp, VersionedKey};
use super::traits::MemTable;
use super::types::{StorageError, StorageResult, StorageType, Value};
use std::path::Path;

const VERSION_LEN: usize = std::mem::size_of::<Timestamp>();
const VERSIONS_TREE: &str = "versions";

/// Sled-backed versioned store
pub struct SledMemTable {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledMemTable {
    /// Open or create a sled database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree(VERSIONS_TREE)?;
        Ok(Self { db, tree })
    }

    fn encode_key(key: &[u8], version: Timestamp) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(key.len() + VERSION_LEN);
        encoded.extend_from_slice(key);
        encoded.extend_from_slice(&version.to_be_bytes());
        encoded
    }

    fn decode_version(encoded: &[u8]) -> StorageResult<Timestamp> {
        let split = encoded.len().checked_sub(VERSION_LEN).ok_or_else(|| {
            StorageError::CorruptKey(format!("{} bytes is shorter than a version", encoded.len()))
        })?;
        let mut version = [0u8; VERSION_LEN];
        version.copy_from_slice(&encoded[split..]);
        Ok(Timestamp::from_be_bytes(version))
    }

    /// Whether an encoded key carries exactly `key` as its raw part.
    /// Longer raw keys sharing `key` as a prefix also fall into range scans.
    fn encodes_raw_key(encoded: &[u8], key: &[u8]) -> bool {
        encoded.len() == key.len() + VERSION_LEN && encoded.starts_with(key)
    }

    fn decode_value(bytes: &[u8]) -> StorageResult<Value> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl MemTable for SledMemTable {
    fn get(&self, key: &VersionedKey) -> StorageResult<Option<Value>> {
        let lower = Self::encode_key(key.key(), 0);
        let upper = Self::encode_key(key.key(), key.version());

        for entry in self.tree.range(lower..=upper).rev() {
            let (encoded, value) = entry?;
            if Self::encodes_raw_key(&encoded, key.key()) {
                return Self::decode_value(&value).map(Some);
            }
        }
        Ok(None)
    }

    fn set(&self, key: VersionedKey, value: Value) -> StorageResult<()> {
        let encoded = Self::encode_key(key.key(), key.version());
        self.tree.insert(encoded, bincode::serialize(&value)?)?;
        Ok(())
    }

    fn apply_batch(&self, entries: Vec<(VersionedKey, Value)>) -> StorageResult<()> {
        let mut batch = sled::Batch::default();
        for (key, value) in entries {
            batch.insert(
                Self::encode_key(key.key(), key.version()),
                bincode::serialize(&value)?,
            );
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn versions(&self, key: &[u8]) -> StorageResult<Vec<(Timestamp, Value)>> {
        let mut versions = Vec::new();
        for entry in self.tree.scan_prefix(key) {
            let (encoded, value) = entry?;
            if Self::encodes_raw_key(&encoded, key) {
                versions.push((Self::decode_version(&encoded)?, Self::decode_value(&value)?));
            }
        }
        Ok(versions)
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.tree.len())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Sled
    }
}
