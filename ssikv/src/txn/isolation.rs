// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction isolation level management
//!
//! This module defines the isolation levels the oracle can enforce when it
//! validates a read-write transaction at commit time.

use serde::{Deserialize, Serialize};

/// Isolation levels supported by the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IsolationLevel {
    /// SNAPSHOT - Reads see a consistent snapshot; a commit aborts only when a
    /// concurrent commit wrote one of the same keys. Write skew is possible.
    Snapshot,
    /// SERIALIZABLE - A commit aborts when a concurrent commit wrote a key this
    /// transaction read. Prevents write skew.
    #[default]
    Serializable,
}

impl IsolationLevel {
    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Check if this isolation level prevents write skew
    /// Write skew: two transactions read overlapping data and write disjoint keys
    pub fn prevents_write_skew(&self) -> bool {
        matches!(self, IsolationLevel::Serializable)
    }

    /// Check if read keys must be tracked for conflict detection
    pub fn tracks_reads(&self) -> bool {
        matches!(self, IsolationLevel::Serializable)
    }

    /// Get the strictness level (higher number = more strict)
    pub fn strictness_level(&self) -> u8 {
        match self {
            IsolationLevel::Snapshot => 0,
            IsolationLevel::Serializable => 1,
        }
    }

    /// Check if this isolation level is at least as strict as another
    pub fn is_at_least_as_strict_as(&self, other: &IsolationLevel) -> bool {
        self.strictness_level() >= other.strictness_level()
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SNAPSHOT" | "SNAPSHOT ISOLATION" | "SNAPSHOT_ISOLATION" => {
                Ok(IsolationLevel::Snapshot)
            }
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("Unknown isolation level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_strictness() {
        assert!(IsolationLevel::Serializable.is_at_least_as_strict_as(&IsolationLevel::Snapshot));
        assert!(!IsolationLevel::Snapshot.is_at_least_as_strict_as(&IsolationLevel::Serializable));
    }

    #[test]
    fn test_isolation_level_properties() {
        assert!(IsolationLevel::Serializable.prevents_write_skew());
        assert!(!IsolationLevel::Snapshot.prevents_write_skew());
        assert!(!IsolationLevel::Snapshot.tracks_reads());
        assert_eq!(IsolationLevel::default(), IsolationLevel::Serializable);
    }

    #[test]
    fn test_isolation_level_parsing() {
        assert_eq!(
            "snapshot".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Snapshot
        );
        assert_eq!(
            "SERIALIZABLE".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("READ COMMITTED".parse::<IsolationLevel>().is_err());
    }
}
