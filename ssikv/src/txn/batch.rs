// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Write batches and commit completion

use super::error::{TransactionError, TransactionResult};
use crate::storage::{Timestamp, Value, VersionedKey};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use tokio::sync::oneshot;

/// Pending writes of one in-flight read-write transaction.
/// Each raw key appears at most once.
#[derive(Debug, Default)]
pub struct Batch {
    pairs: HashMap<Vec<u8>, Value>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a write, rejecting a key already present in the batch
    pub fn add(&mut self, key: Vec<u8>, value: Value) -> TransactionResult<()> {
        match self.pairs.entry(key) {
            Entry::Occupied(occupied) => Err(TransactionError::DuplicateKey {
                key: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.pairs.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.pairs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.pairs.keys().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Freeze this batch at `commit_ts`.
    ///
    /// `on_applied` runs exactly once when the batch leaves the executor,
    /// whether it was applied, rejected or dropped.
    pub(crate) fn into_timestamped<F>(
        self,
        commit_ts: Timestamp,
        on_applied: F,
    ) -> (TimestampedBatch, CompletionHandle)
    where
        F: FnOnce() + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        (
            TimestampedBatch {
                batch: self,
                commit_ts,
                on_applied: Some(Box::new(on_applied)),
                completion: Some(sender),
            },
            CompletionHandle {
                commit_ts,
                receiver,
            },
        )
    }
}

type CompletionSender = oneshot::Sender<TransactionResult<Timestamp>>;

/// A batch stamped with its commit timestamp, queued for the executor
pub struct TimestampedBatch {
    batch: Batch,
    commit_ts: Timestamp,
    on_applied: Option<Box<dyn FnOnce() + Send>>,
    completion: Option<CompletionSender>,
}

impl TimestampedBatch {
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Drain the writes as versioned entries at the commit timestamp
    pub(crate) fn take_entries(&mut self) -> Vec<(VersionedKey, Value)> {
        let commit_ts = self.commit_ts;
        std::mem::take(&mut self.batch.pairs)
            .into_iter()
            .map(|(key, value)| (VersionedKey::new(key, commit_ts), value))
            .collect()
    }

    /// Run the applied callback, then resolve the completion handle
    pub(crate) fn complete(mut self, outcome: TransactionResult<Timestamp>) {
        self.resolve(outcome);
    }

    fn resolve(&mut self, outcome: TransactionResult<Timestamp>) {
        if let Some(on_applied) = self.on_applied.take() {
            on_applied();
        }
        if let Some(completion) = self.completion.take() {
            // The committer may have dropped its handle
            let _ = completion.send(outcome);
        }
    }
}

impl Drop for TimestampedBatch {
    fn drop(&mut self) {
        if self.completion.is_some() || self.on_applied.is_some() {
            self.resolve(Err(TransactionError::ExecutorHalted(format!(
                "batch at commit timestamp {} was dropped before it was applied",
                self.commit_ts
            ))));
        }
    }
}

impl std::fmt::Debug for TimestampedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampedBatch")
            .field("commit_ts", &self.commit_ts)
            .field("writes", &self.batch.len())
            .finish()
    }
}

/// Resolves once a committed batch has been applied to storage.
///
/// Use [`wait`](CompletionHandle::wait) from synchronous code, or `.await` the
/// handle from async code. `wait` must not be called from inside an async
/// runtime.
#[derive(Debug)]
pub struct CompletionHandle {
    commit_ts: Timestamp,
    receiver: oneshot::Receiver<TransactionResult<Timestamp>>,
}

impl CompletionHandle {
    /// Commit timestamp assigned to the transaction
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    /// Block until the writes are visible in storage
    pub fn wait(self) -> TransactionResult<Timestamp> {
        let commit_ts = self.commit_ts;
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(Self::lost(commit_ts)))
    }

    fn lost(commit_ts: Timestamp) -> TransactionError {
        TransactionError::ExecutorHalted(format!(
            "completion for commit timestamp {} was lost",
            commit_ts
        ))
    }
}

impl IntoFuture for CompletionHandle {
    type Output = TransactionResult<Timestamp>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        let commit_ts = self.commit_ts;
        Box::pin(async move {
            self.receiver
                .await
                .unwrap_or_else(|_| Err(Self::lost(commit_ts)))
        })
    }
}
