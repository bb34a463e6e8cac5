// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! MemTable trait
//!
//! The transaction core only needs ordered, multi-version reads and writes from
//! its storage. Any backend implementing [`MemTable`] can sit underneath the
//! oracle.

use super::key::{Timestamp, VersionedKey};
use super::types::{StorageResult, StorageType, Value};

/// Ordered multi-version key/value storage
///
/// Entries are ordered by raw key ascending, then version ascending. Only the
/// transaction executor writes; readers may call `get` concurrently.
pub trait MemTable: Send + Sync {
    /// Return the value with the greatest version `<= key.version()` stored for
    /// `key.key()`, or `None` if no such version exists
    fn get(&self, key: &VersionedKey) -> StorageResult<Option<Value>>;

    /// Store one versioned entry
    fn set(&self, key: VersionedKey, value: Value) -> StorageResult<()>;

    /// Store all entries of one commit, all or nothing
    fn apply_batch(&self, entries: Vec<(VersionedKey, Value)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Every stored version of `key`, oldest first
    fn versions(&self, key: &[u8]) -> StorageResult<Vec<(Timestamp, Value)>>;

    /// Number of versioned entries
    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush any pending writes to durable media
    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    fn storage_type(&self) -> StorageType;
}
