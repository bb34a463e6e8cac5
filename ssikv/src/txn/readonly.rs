// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-only snapshot transactions

use std::sync::Arc;

use super::error::TransactionResult;
use super::oracle::Oracle;
use super::state::{AccessMode, TransactionId};
use crate::storage::{Timestamp, Value, VersionedKey};

/// Snapshot of the store as of its begin timestamp. Never conflicts and
/// needs no commit.
pub struct ReadonlyTransaction {
    id: TransactionId,
    begin_ts: Timestamp,
    oracle: Arc<Oracle>,
}

impl ReadonlyTransaction {
    pub(crate) fn new(oracle: Arc<Oracle>, id: TransactionId, begin_ts: Timestamp) -> Self {
        Self {
            id,
            begin_ts,
            oracle,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn begin_ts(&self) -> Timestamp {
        self.begin_ts
    }

    pub fn access_mode(&self) -> AccessMode {
        AccessMode::ReadOnly
    }

    /// Latest value of `key` committed at or before the begin timestamp
    pub fn get(&self, key: impl AsRef<[u8]>) -> TransactionResult<Option<Vec<u8>>> {
        let found = self
            .oracle
            .memtable()
            .get(&VersionedKey::new(key.as_ref(), self.begin_ts))?;
        Ok(found.and_then(Value::into_payload))
    }
}

impl std::fmt::Debug for ReadonlyTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadonlyTransaction")
            .field("id", &self.id)
            .field("begin_ts", &self.begin_ts)
            .finish()
    }
}
