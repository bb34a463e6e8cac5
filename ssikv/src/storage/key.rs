// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned keys
//!
//! Every write lands in storage under a `(raw key, version)` pair. Versions are
//! commit timestamps, so a raw key accumulates one entry per committed write and
//! older entries are never overwritten.

use serde::{Deserialize, Serialize};

/// Logical timestamp handed out by the oracle
pub type Timestamp = u64;

/// A raw key paired with the version it was (or is being) read or written at.
///
/// Ordering is by raw key bytes first (lexicographic), then by version
/// ascending, which the derived `Ord` gives us from the field order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionedKey {
    key: Vec<u8>,
    version: Timestamp,
}

impl VersionedKey {
    pub fn new(key: impl Into<Vec<u8>>, version: Timestamp) -> Self {
        Self {
            key: key.into(),
            version,
        }
    }

    /// Raw key bytes without the version
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn version(&self) -> Timestamp {
        self.version
    }

    /// Lowest possible versioned key for `key`
    pub(crate) fn first_version_of(key: &[u8]) -> Self {
        Self::new(key.to_vec(), 0)
    }

    pub(crate) fn is_version_of(&self, key: &[u8]) -> bool {
        self.key == key
    }
}

impl std::fmt::Display for VersionedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", String::from_utf8_lossy(&self.key), self.version)
    }
}
