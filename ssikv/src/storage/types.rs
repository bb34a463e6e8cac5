// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage types and error handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value stored under one versioned key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Opaque user payload
    Bytes(Vec<u8>),
    /// Deletion marker; readers resolving to it see "not found"
    Tombstone,
}

impl Value {
    pub fn bytes(payload: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(payload.into())
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    /// Payload visible to a reader, `None` for a tombstone
    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(payload) => Some(payload),
            Value::Tombstone => None,
        }
    }
}

/// Storage backend selection
///
/// Specifies which implementation backs the versioned key/value store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum StorageType {
    /// Ordered in-memory map
    /// Best for: tests, ephemeral workloads
    #[default]
    Memory,

    /// Sled - Pure Rust embedded database
    /// Best for: data sets larger than memory
    Sled,
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "sled" => Ok(StorageType::Sled),
            _ => Err(format!(
                "Unknown storage type: {}. Valid options: memory, sled",
                s
            )),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageType::Memory => "memory",
            StorageType::Sled => "sled",
        };
        write!(f, "{}", name)
    }
}

/// Error type for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure (sled, I/O, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored key bytes do not decode into a versioned key
    #[error("Corrupt key: {0}")]
    CorruptKey(String),

    /// Backend needs a filesystem location that was not provided
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
