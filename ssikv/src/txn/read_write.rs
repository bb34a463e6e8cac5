// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-write transactions
//!
//! Writes are buffered in a local [`Batch`] until commit. Reads consult the
//! batch first (read-your-own-writes) and fall back to the snapshot at the
//! begin timestamp; snapshot reads are recorded for conflict detection.

use std::collections::HashSet;
use std::sync::Arc;

use super::batch::{Batch, CompletionHandle};
use super::error::{TransactionError, TransactionResult};
use super::oracle::Oracle;
use super::state::{AccessMode, TransactionId, TransactionStatus};
use crate::storage::{Timestamp, Value, VersionedKey};

/// Transaction that buffers writes and is validated by the oracle at commit
pub struct ReadWriteTransaction {
    id: TransactionId,
    begin_ts: Timestamp,
    batch: Batch,
    read_set: HashSet<Vec<u8>>,
    status: TransactionStatus,
    /// Whether the begin mark has been released for `begin_ts`
    begin_finished: bool,
    oracle: Arc<Oracle>,
}

impl ReadWriteTransaction {
    pub(crate) fn new(oracle: Arc<Oracle>, id: TransactionId, begin_ts: Timestamp) -> Self {
        Self {
            id,
            begin_ts,
            batch: Batch::new(),
            read_set: HashSet::new(),
            status: TransactionStatus::Active,
            begin_finished: false,
            oracle,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn begin_ts(&self) -> Timestamp {
        self.begin_ts
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn access_mode(&self) -> AccessMode {
        AccessMode::ReadWrite
    }

    /// Buffer a write. Fails with `DuplicateKey` if `key` was already written
    /// in this transaction; the earlier write is kept.
    pub fn put(
        &mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> TransactionResult<()> {
        self.ensure_active()?;
        self.batch.add(key.into(), Value::bytes(value))
    }

    /// Buffer a deletion; same duplicate rule as [`put`](Self::put)
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> TransactionResult<()> {
        self.ensure_active()?;
        self.batch.add(key.into(), Value::Tombstone)
    }

    /// Read `key`, seeing this transaction's own buffered writes first
    pub fn get(&mut self, key: impl AsRef<[u8]>) -> TransactionResult<Option<Vec<u8>>> {
        self.ensure_active()?;
        let key = key.as_ref();

        if let Some(buffered) = self.batch.get(key) {
            return Ok(buffered.clone().into_payload());
        }

        if self.oracle.isolation_level().tracks_reads() {
            self.read_set.insert(key.to_vec());
        }
        let found = self
            .oracle
            .memtable()
            .get(&VersionedKey::new(key, self.begin_ts))?;
        Ok(found.and_then(Value::into_payload))
    }

    /// Commit the buffered writes.
    ///
    /// Returns a handle that resolves once the writes are applied to storage.
    /// On `Conflict` the transaction is aborted and nothing is applied; retry
    /// with a new transaction.
    pub fn commit(&mut self) -> TransactionResult<CompletionHandle> {
        self.ensure_active()?;
        if self.batch.is_empty() {
            return Err(TransactionError::EmptyTransaction);
        }

        let oracle = self.oracle.clone();
        let result = oracle.commit_transaction(self);
        self.begin_finished = true;
        self.status = match &result {
            Ok(_) => TransactionStatus::Committed,
            Err(_) => {
                self.batch = Batch::new();
                TransactionStatus::Aborted
            }
        };
        result
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.batch.len()
    }

    /// Keys read from the snapshot so far
    pub fn read_keys(&self) -> impl Iterator<Item = &[u8]> {
        self.read_set.iter().map(Vec::as_slice)
    }

    pub(crate) fn read_set(&self) -> &HashSet<Vec<u8>> {
        &self.read_set
    }

    pub(crate) fn write_keys(&self) -> HashSet<Vec<u8>> {
        self.batch.keys().map(<[u8]>::to_vec).collect()
    }

    pub(crate) fn take_batch(&mut self) -> Batch {
        std::mem::take(&mut self.batch)
    }

    fn ensure_active(&self) -> TransactionResult<()> {
        if self.status.is_terminal() {
            return Err(TransactionError::NotActive {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

impl Drop for ReadWriteTransaction {
    fn drop(&mut self) {
        if self.status == TransactionStatus::Active {
            self.status = TransactionStatus::Abandoned;
            log::debug!(
                "{} abandoned with {} buffered write(s)",
                self.id,
                self.batch.len()
            );
        }
        if !self.begin_finished {
            self.begin_finished = true;
            self.oracle.finish_begin(self.begin_ts);
        }
    }
}

impl std::fmt::Debug for ReadWriteTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteTransaction")
            .field("id", &self.id)
            .field("begin_ts", &self.begin_ts)
            .field("status", &self.status)
            .field("pending_writes", &self.batch.len())
            .field("reads", &self.read_set.len())
            .finish()
    }
}
