// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Oracle configuration

use crate::storage::{StorageType, Timestamp};
use crate::txn::{IsolationLevel, TransactionError, TransactionResult};
use serde::{Deserialize, Serialize};

/// Configuration for an [`Oracle`](crate::Oracle) and the executor it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// First commit timestamp handed out; the first snapshot reads at this minus one
    pub initial_commit_timestamp: Timestamp,

    /// Maximum committed batches waiting for the executor before committers block
    pub executor_queue_capacity: usize,

    /// Conflict rule applied at commit time
    pub isolation_level: IsolationLevel,

    /// Backend created by `Oracle::open`
    pub storage_type: StorageType,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            initial_commit_timestamp: 1,
            executor_queue_capacity: 1024,
            isolation_level: IsolationLevel::Serializable,
            storage_type: StorageType::Memory,
        }
    }
}

impl OracleConfig {
    /// Configuration for many small concurrent commits
    pub fn write_heavy() -> Self {
        Self {
            executor_queue_capacity: 16 * 1024,
            ..Self::default()
        }
    }

    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    pub fn with_initial_commit_timestamp(mut self, ts: Timestamp) -> Self {
        self.initial_commit_timestamp = ts;
        self
    }

    pub fn with_executor_queue_capacity(mut self, capacity: usize) -> Self {
        self.executor_queue_capacity = capacity;
        self
    }

    /// Parse a JSON document; omitted fields take their defaults
    pub fn from_json(json: &str) -> TransactionResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TransactionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TransactionResult<()> {
        if self.initial_commit_timestamp == 0 {
            return Err(TransactionError::InvalidConfig(
                "initial_commit_timestamp must be at least 1".to_string(),
            ));
        }
        if self.executor_queue_capacity == 0 {
            return Err(TransactionError::InvalidConfig(
                "executor_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
