// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! MemTable factory
//!
//! Builds the configured storage backend behind a shared trait object.

use super::memory::MemoryMemTable;
use super::traits::MemTable;
use super::types::{StorageError, StorageResult, StorageType};
use std::path::Path;
use std::sync::Arc;

/// Create a MemTable for `storage_type`
///
/// # Arguments
/// * `storage_type` - Backend to create
/// * `path` - Filesystem location; required by persistent backends, ignored by `Memory`
pub fn create_memtable(
    storage_type: StorageType,
    path: Option<&Path>,
) -> StorageResult<Arc<dyn MemTable>> {
    match storage_type {
        StorageType::Memory => Ok(Arc::new(MemoryMemTable::new())),
        #[cfg(feature = "sled-backend")]
        StorageType::Sled => {
            use super::sled::SledMemTable;
            let path = path.ok_or_else(|| {
                StorageError::InvalidPath("sled storage requires a database path".to_string())
            })?;
            Ok(Arc::new(SledMemTable::open(path)?))
        }
        #[cfg(not(feature = "sled-backend"))]
        StorageType::Sled => {
            let _ = path;
            Err(StorageError::Backend(
                "sled storage backend not compiled in (enable the `sled-backend` feature)"
                    .to_string(),
            ))
        }
    }
}
