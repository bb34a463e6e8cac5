// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction executor
//!
//! One worker thread owns every storage mutation. Committed batches are applied
//! strictly in the order they were queued, which the oracle guarantees is
//! commit-timestamp order, so storage always reflects a prefix of a single
//! linear commit history.
//!
//! If storage rejects a batch the executor halts: that batch's handle receives
//! the storage error and every later batch is failed without touching storage.

use super::batch::TimestampedBatch;
use super::error::{TransactionError, TransactionResult};
use crate::storage::MemTable;
use crossbeam_channel::{self as channel, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Serial applier of committed batches
pub struct TransactionExecutor {
    batches: Sender<TimestampedBatch>,
    stop: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    halted: Arc<Mutex<Option<String>>>,
    applied: Arc<AtomicU64>,
}

impl TransactionExecutor {
    /// Start the worker with a queue bounded to `queue_capacity` batches
    pub fn new(memtable: Arc<dyn MemTable>, queue_capacity: usize) -> TransactionResult<Self> {
        let (batches, incoming) = channel::bounded(queue_capacity);
        let (stop, stopped) = channel::bounded(0);
        let halted = Arc::new(Mutex::new(None));
        let applied = Arc::new(AtomicU64::new(0));

        let worker = ExecutorWorker {
            memtable,
            halted: halted.clone(),
            applied: applied.clone(),
        };
        let worker = std::thread::Builder::new()
            .name("ssikv-executor".to_string())
            .spawn(move || worker.run(incoming, stopped))?;

        Ok(Self {
            batches,
            stop: Mutex::new(Some(stop)),
            worker: Mutex::new(Some(worker)),
            halted,
            applied,
        })
    }

    /// Queue a batch; blocks while the queue is full.
    ///
    /// If the executor has stopped, the batch is dropped, which resolves its
    /// handle with `ExecutorHalted` and runs its applied callback.
    pub fn submit(&self, batch: TimestampedBatch) -> TransactionResult<()> {
        self.batches.send(batch).map_err(|rejected| {
            let commit_ts = rejected.into_inner().commit_ts();
            log::warn!("executor stopped; rejecting batch at {}", commit_ts);
            TransactionError::ExecutorHalted("executor is stopped".to_string())
        })
    }

    /// Reason the executor stopped applying batches, if it has
    pub fn halt_reason(&self) -> Option<String> {
        self.halted.lock().clone()
    }

    /// Number of batches applied to storage so far
    pub fn applied_batches(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    /// Number of batches waiting in the queue
    pub fn queued_batches(&self) -> usize {
        self.batches.len()
    }

    /// Apply everything already queued, then stop the worker
    pub fn stop(&self) {
        // Dropping the stop sender wakes the worker
        self.stop.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::warn!("executor worker panicked");
            }
        }
    }
}

impl Drop for TransactionExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ExecutorWorker {
    memtable: Arc<dyn MemTable>,
    halted: Arc<Mutex<Option<String>>>,
    applied: Arc<AtomicU64>,
}

impl ExecutorWorker {
    fn run(self, incoming: Receiver<TimestampedBatch>, stopped: Receiver<()>) {
        loop {
            select! {
                recv(incoming) -> batch => match batch {
                    Ok(batch) => self.apply(batch),
                    Err(_) => break,
                },
                recv(stopped) -> _ => {
                    for batch in incoming.try_iter() {
                        self.apply(batch);
                    }
                    break;
                }
            }
        }
        log::debug!(
            "executor stopped after applying {} batch(es)",
            self.applied.load(Ordering::Acquire)
        );
    }

    fn apply(&self, mut batch: TimestampedBatch) {
        let commit_ts = batch.commit_ts();

        if let Some(reason) = self.halted.lock().clone() {
            batch.complete(Err(TransactionError::ExecutorHalted(reason)));
            return;
        }

        let entries = batch.take_entries();
        let writes = entries.len();
        match self.memtable.apply_batch(entries) {
            Ok(()) => {
                self.applied.fetch_add(1, Ordering::AcqRel);
                log::debug!("applied {} write(s) at commit timestamp {}", writes, commit_ts);
                batch.complete(Ok(commit_ts));
            }
            Err(e) => {
                log::error!(
                    "storage rejected batch at commit timestamp {}; halting executor: {}",
                    commit_ts,
                    e
                );
                *self.halted.lock() = Some(format!(
                    "storage failure at commit timestamp {}: {}",
                    commit_ts, e
                ));
                batch.complete(Err(e.into()));
            }
        }
    }
}
