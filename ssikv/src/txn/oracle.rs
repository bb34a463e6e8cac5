// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Timestamp oracle
//!
//! The oracle is the single authority for begin and commit timestamps and the
//! place where read-write transactions are validated. It owns both timestamp
//! marks and the executor that applies committed batches.
//!
//! Conflict rule (serializable): a committing transaction aborts if any
//! transaction that committed after it began wrote a key it read. Committed
//! write sets are retained only until no pending transaction began before
//! their commit.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::batch::CompletionHandle;
use super::error::{TransactionError, TransactionResult};
use super::executor::TransactionExecutor;
use super::isolation::IsolationLevel;
use super::mark::{TransactionTimestampMark, WaitContext};
use super::read_write::ReadWriteTransaction;
use super::readonly::ReadonlyTransaction;
use super::state::TransactionId;
use crate::config::OracleConfig;
use crate::storage::{create_memtable, MemTable, Timestamp};

/// Write set of a committed transaction, kept while it can still conflict
#[derive(Debug)]
pub(crate) struct CommittedTransaction {
    commit_ts: Timestamp,
    keys: HashSet<Vec<u8>>,
}

struct OracleState {
    next_commit_timestamp: Timestamp,
    /// Ordered by commit timestamp
    committed_transactions: VecDeque<CommittedTransaction>,
}

#[derive(Default)]
struct OracleCounters {
    readonly_begun: AtomicU64,
    read_write_begun: AtomicU64,
    committed: AtomicU64,
    conflicts: AtomicU64,
}

/// Central timestamp authority and conflict detector
pub struct Oracle {
    config: OracleConfig,
    state: Mutex<OracleState>,
    /// Held from commit timestamp issuance until the batch is queued, so queue
    /// order equals commit timestamp order
    write_serialize_lock: Mutex<()>,
    begin_mark: TransactionTimestampMark,
    commit_mark: Arc<TransactionTimestampMark>,
    executor: TransactionExecutor,
    memtable: Arc<dyn MemTable>,
    next_transaction_id: AtomicU64,
    closed: AtomicBool,
    counters: OracleCounters,
}

impl Oracle {
    /// Create an oracle over an existing MemTable
    pub fn new(config: OracleConfig, memtable: Arc<dyn MemTable>) -> TransactionResult<Arc<Self>> {
        config.validate()?;

        let last_committed = config.initial_commit_timestamp - 1;
        let begin_mark = TransactionTimestampMark::new("begin", last_committed)?;
        let commit_mark = Arc::new(TransactionTimestampMark::new("commit", last_committed)?);
        let executor = TransactionExecutor::new(memtable.clone(), config.executor_queue_capacity)?;

        log::debug!(
            "oracle started: next commit timestamp {}, {} isolation, {} storage",
            config.initial_commit_timestamp,
            config.isolation_level,
            memtable.storage_type()
        );

        Ok(Arc::new(Self {
            state: Mutex::new(OracleState {
                next_commit_timestamp: config.initial_commit_timestamp,
                committed_transactions: VecDeque::new(),
            }),
            write_serialize_lock: Mutex::new(()),
            begin_mark,
            commit_mark,
            executor,
            memtable,
            next_transaction_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            counters: OracleCounters::default(),
            config,
        }))
    }

    /// Create an oracle over the backend named by `config.storage_type`
    ///
    /// # Arguments
    /// * `path` - Database directory, required for persistent backends
    pub fn open(config: OracleConfig, path: Option<&Path>) -> TransactionResult<Arc<Self>> {
        let memtable = create_memtable(config.storage_type, path)?;
        Self::new(config, memtable)
    }

    /// Oracle with default configuration over a fresh in-memory store
    pub fn in_memory() -> TransactionResult<Arc<Self>> {
        Self::open(OracleConfig::default(), None)
    }

    /// Open a read-only snapshot transaction
    pub fn new_readonly_transaction(self: &Arc<Self>) -> ReadonlyTransaction {
        let begin_ts = self.begin_timestamp();
        self.readonly_transaction_at(begin_ts)
    }

    /// Open a read-only snapshot transaction, giving up if `ctx` is cancelled
    /// before the snapshot is fully applied
    pub fn new_readonly_transaction_with(
        self: &Arc<Self>,
        ctx: &WaitContext,
    ) -> TransactionResult<ReadonlyTransaction> {
        let begin_ts = self.begin_timestamp_with(ctx)?;
        Ok(self.readonly_transaction_at(begin_ts))
    }

    /// Open a read-write transaction
    pub fn new_read_write_transaction(self: &Arc<Self>) -> ReadWriteTransaction {
        let begin_ts = self.begin_timestamp();
        self.read_write_transaction_at(begin_ts)
    }

    /// Open a read-write transaction, giving up if `ctx` is cancelled before
    /// the snapshot is fully applied
    pub fn new_read_write_transaction_with(
        self: &Arc<Self>,
        ctx: &WaitContext,
    ) -> TransactionResult<ReadWriteTransaction> {
        let begin_ts = self.begin_timestamp_with(ctx)?;
        Ok(self.read_write_transaction_at(begin_ts))
    }

    fn readonly_transaction_at(self: &Arc<Self>, begin_ts: Timestamp) -> ReadonlyTransaction {
        // Read-only transactions never conflict, so nothing needs to retain
        // committed records on their behalf
        self.begin_mark.finish(begin_ts);
        self.counters.readonly_begun.fetch_add(1, Ordering::Relaxed);
        let id = self.next_transaction_id();
        log::debug!("{} began read-only at {}", id, begin_ts);
        ReadonlyTransaction::new(self.clone(), id, begin_ts)
    }

    fn read_write_transaction_at(self: &Arc<Self>, begin_ts: Timestamp) -> ReadWriteTransaction {
        self.counters.read_write_begun.fetch_add(1, Ordering::Relaxed);
        let id = self.next_transaction_id();
        log::debug!("{} began read-write at {}", id, begin_ts);
        ReadWriteTransaction::new(self.clone(), id, begin_ts)
    }

    /// Issue a begin timestamp and block until every commit up to it is applied
    pub fn begin_timestamp(&self) -> Timestamp {
        let begin_ts = self.register_begin();
        if let Err(e) = self
            .commit_mark
            .wait_for_mark(begin_ts, &WaitContext::background())
        {
            log::warn!(
                "snapshot at {} not confirmed against applied commits: {}",
                begin_ts,
                e
            );
        }
        begin_ts
    }

    /// Like [`begin_timestamp`](Self::begin_timestamp), but the wait honours `ctx`.
    /// On cancellation the begin timestamp is released and no snapshot is issued.
    pub fn begin_timestamp_with(&self, ctx: &WaitContext) -> TransactionResult<Timestamp> {
        let begin_ts = self.register_begin();
        if let Err(e) = self.commit_mark.wait_for_mark(begin_ts, ctx) {
            self.begin_mark.finish(begin_ts);
            return Err(e);
        }
        Ok(begin_ts)
    }

    fn register_begin(&self) -> Timestamp {
        let state = self.state.lock();
        let begin_ts = state.next_commit_timestamp - 1;
        self.begin_mark.begin(begin_ts);
        begin_ts
    }

    /// Validate `txn` and, if it does not conflict, issue its commit timestamp.
    ///
    /// Either way the transaction's begin timestamp is finished in the begin mark.
    pub(crate) fn try_commit(&self, txn: &ReadWriteTransaction) -> TransactionResult<Timestamp> {
        let mut state = self.state.lock();

        if self.has_conflict(&state, txn) {
            self.begin_mark.finish(txn.begin_ts());
            self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
            log::debug!("{} conflicts; aborting", txn.id());
            return Err(TransactionError::Conflict {
                begin_ts: txn.begin_ts(),
            });
        }

        self.begin_mark.finish(txn.begin_ts());
        self.cleanup_committed_transactions(&mut state);

        let commit_ts = state.next_commit_timestamp;
        state.next_commit_timestamp += 1;
        state.committed_transactions.push_back(CommittedTransaction {
            commit_ts,
            keys: txn.write_keys(),
        });
        self.commit_mark.begin(commit_ts);

        Ok(commit_ts)
    }

    /// Validate, stamp and queue a read-write transaction's writes
    pub(crate) fn commit_transaction(
        &self,
        txn: &mut ReadWriteTransaction,
    ) -> TransactionResult<CompletionHandle> {
        if self.closed.load(Ordering::Acquire) {
            self.begin_mark.finish(txn.begin_ts());
            return Err(TransactionError::OracleClosed);
        }
        if let Some(reason) = self.executor.halt_reason() {
            self.begin_mark.finish(txn.begin_ts());
            return Err(TransactionError::ExecutorHalted(reason));
        }

        let _serialized = self.write_serialize_lock.lock();
        let commit_ts = self.try_commit(txn)?;

        let commit_mark = self.commit_mark.clone();
        let (batch, handle) = txn
            .take_batch()
            .into_timestamped(commit_ts, move || commit_mark.finish(commit_ts));
        let writes = batch.len();
        self.executor.submit(batch)?;

        self.counters.committed.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "{} committed at {} with {} write(s)",
            txn.id(),
            commit_ts,
            writes
        );
        Ok(handle)
    }

    /// Release the begin timestamp of a read-write transaction that will never commit
    pub(crate) fn finish_begin(&self, begin_ts: Timestamp) {
        self.begin_mark.finish(begin_ts);
    }

    fn has_conflict(&self, state: &OracleState, txn: &ReadWriteTransaction) -> bool {
        let begin_ts = txn.begin_ts();
        let mut concurrent = state
            .committed_transactions
            .iter()
            .filter(|committed| committed.commit_ts > begin_ts);

        match self.config.isolation_level {
            IsolationLevel::Serializable => {
                let reads = txn.read_set();
                concurrent.any(|committed| reads.iter().any(|key| committed.keys.contains(key)))
            }
            IsolationLevel::Snapshot => {
                let writes = txn.write_keys();
                concurrent.any(|committed| !committed.keys.is_disjoint(&writes))
            }
        }
    }

    /// Drop committed records no pending transaction can conflict with
    fn cleanup_committed_transactions(&self, state: &mut OracleState) {
        let watermark = self.begin_mark.done_till();
        let before = state.committed_transactions.len();
        while state
            .committed_transactions
            .front()
            .map_or(false, |committed| committed.commit_ts <= watermark)
        {
            state.committed_transactions.pop_front();
        }
        let purged = before - state.committed_transactions.len();
        if purged > 0 {
            log::debug!(
                "purged {} committed record(s) at or below begin watermark {}",
                purged,
                watermark
            );
        }
    }

    fn next_transaction_id(&self) -> TransactionId {
        TransactionId::from_u64(self.next_transaction_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.config.isolation_level
    }

    /// Storage the executor writes to
    pub fn memtable(&self) -> &Arc<dyn MemTable> {
        &self.memtable
    }

    /// Highest begin timestamp below which every transaction has committed or finished
    pub fn begin_done_till(&self) -> Timestamp {
        self.begin_mark.done_till()
    }

    /// Highest commit timestamp below which every commit has been applied
    pub fn commit_done_till(&self) -> Timestamp {
        self.commit_mark.done_till()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get oracle statistics
    pub fn statistics(&self) -> OracleStatistics {
        let (next_commit_timestamp, retained_commit_records) = {
            let state = self.state.lock();
            (
                state.next_commit_timestamp,
                state.committed_transactions.len(),
            )
        };

        OracleStatistics {
            readonly_transactions: self.counters.readonly_begun.load(Ordering::Relaxed),
            read_write_transactions: self.counters.read_write_begun.load(Ordering::Relaxed),
            committed_transactions: self.counters.committed.load(Ordering::Relaxed),
            conflicts: self.counters.conflicts.load(Ordering::Relaxed),
            retained_commit_records,
            next_commit_timestamp,
            begin_done_till: self.begin_mark.done_till(),
            commit_done_till: self.commit_mark.done_till(),
            applied_batches: self.executor.applied_batches(),
            queued_batches: self.executor.queued_batches(),
        }
    }

    /// Refuse new commits, apply and flush everything already queued, then
    /// stop the background workers. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wait out any commit between timestamp issuance and queueing
        drop(self.write_serialize_lock.lock());

        self.executor.stop();
        if let Err(e) = self.memtable.flush() {
            log::warn!("failed to flush storage on shutdown: {}", e);
        }
        self.begin_mark.stop();
        self.commit_mark.stop();
        log::debug!("oracle shut down");
    }
}

impl Drop for Oracle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Oracle statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct OracleStatistics {
    pub readonly_transactions: u64,
    pub read_write_transactions: u64,
    pub committed_transactions: u64,
    pub conflicts: u64,
    pub retained_commit_records: usize,
    pub next_commit_timestamp: Timestamp,
    pub begin_done_till: Timestamp,
    pub commit_done_till: Timestamp,
    pub applied_batches: u64,
    pub queued_batches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_timestamp_is_next_commit_minus_one() {
        let oracle = Oracle::new(
            OracleConfig::default().with_initial_commit_timestamp(10),
            Arc::new(crate::storage::MemoryMemTable::new()),
        )
        .unwrap();

        assert_eq!(oracle.begin_timestamp(), 9);
        assert_eq!(oracle.statistics().next_commit_timestamp, 10);
    }

    #[test]
    fn test_commit_timestamps_strictly_increase() {
        let oracle = Oracle::in_memory().unwrap();

        let mut last = 0;
        for i in 0..10 {
            let mut txn = oracle.new_read_write_transaction();
            txn.put(format!("key-{}", i), "v").unwrap();
            let commit_ts = txn.commit().unwrap().wait().unwrap();
            assert!(commit_ts > last);
            last = commit_ts;
        }
        assert_eq!(last, 10);
    }

    #[test]
    fn test_conflict_boundary_is_strict() {
        let oracle = Oracle::in_memory().unwrap();

        let mut writer = oracle.new_read_write_transaction();
        writer.put("k", "1").unwrap();
        let commit_ts = writer.commit().unwrap().wait().unwrap();

        // Began exactly at the writer's commit timestamp: sees it, no conflict
        let mut reader = oracle.new_read_write_transaction();
        assert_eq!(reader.begin_ts(), commit_ts);
        assert_eq!(reader.get("k").unwrap(), Some(b"1".to_vec()));
        reader.put("other", "x").unwrap();
        assert!(reader.commit().is_ok());
    }

    #[test]
    fn test_committed_records_are_purged() {
        let oracle = Oracle::in_memory().unwrap();

        for i in 0..5 {
            let mut txn = oracle.new_read_write_transaction();
            txn.put(format!("k{}", i), "v").unwrap();
            txn.commit().unwrap().wait().unwrap();
        }
        oracle
            .begin_mark
            .wait_for_mark(4, &WaitContext::with_timeout(std::time::Duration::from_secs(5)))
            .unwrap();

        // Every begin up to 4 has finished, so commits 1..=4 can no longer conflict
        let mut last = oracle.new_read_write_transaction();
        last.put("final", "v").unwrap();
        last.commit().unwrap().wait().unwrap();

        let stats = oracle.statistics();
        assert!(stats.retained_commit_records <= 2);
        assert_eq!(stats.committed_transactions, 6);
    }

    #[test]
    fn test_shutdown_rejects_commits() {
        let oracle = Oracle::in_memory().unwrap();
        let mut txn = oracle.new_read_write_transaction();
        txn.put("k", "v").unwrap();

        oracle.shutdown();
        oracle.shutdown();

        assert!(oracle.is_closed());
        assert!(matches!(txn.commit(), Err(TransactionError::OracleClosed)));
    }

    #[test]
    fn test_statistics_serialize() {
        let oracle = Oracle::in_memory().unwrap();
        let _snapshot = oracle.new_readonly_transaction();

        let json = serde_json::to_value(oracle.statistics()).unwrap();
        assert_eq!(json["readonly_transactions"], 1);
        assert_eq!(json["next_commit_timestamp"], 1);
    }
}
