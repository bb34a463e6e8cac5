// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Timestamp watermarks
//!
//! A [`TransactionTimestampMark`] answers "what is the highest timestamp X such
//! that every timestamp <= X that was started has also finished?". The oracle
//! keeps one mark for begin timestamps (bounding cleanup of committed records)
//! and one for commit timestamps (bounding which snapshots are readable).
//!
//! All mutations are funnelled through a single worker thread over a channel,
//! so concurrent `begin`/`finish` calls from many transactions never race on the
//! pending counters. Readers of `done_till` hit an atomic and never block.

use super::error::{TransactionError, TransactionResult};
use crate::storage::Timestamp;
use crossbeam_channel::{self as channel, select, Receiver, Sender};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum MarkMessage {
    Begin(Timestamp),
    Finish(Timestamp),
    Wait {
        ts: Timestamp,
        notify: Sender<()>,
    },
    Stop,
}

/// Cancellation and deadline scope for blocking waits
///
/// Cheap to clone; every clone observes the same cancellation.
#[derive(Clone)]
pub struct WaitContext {
    cancelled: Receiver<()>,
    deadline: Option<Instant>,
}

/// Cancels the [`WaitContext`] it was created with. Dropping the handle cancels too.
pub struct CancelHandle {
    _sender: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(self) {}
}

impl WaitContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self {
            cancelled: channel::never(),
            deadline: None,
        }
    }

    /// A context cancelled when the returned handle is cancelled or dropped
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, cancelled) = channel::bounded(0);
        (
            Self {
                cancelled,
                deadline: None,
            },
            CancelHandle { _sender: sender },
        )
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// Add (or tighten) a deadline on this context
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.cancelled.try_recv(),
            Err(channel::TryRecvError::Disconnected)
        )
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

impl Default for WaitContext {
    fn default() -> Self {
        Self::background()
    }
}

/// Watermark over one stream of timestamps (begin or commit)
pub struct TransactionTimestampMark {
    name: &'static str,
    sender: Sender<MarkMessage>,
    done_till: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionTimestampMark {
    /// Start a mark whose watermark initially sits at `done_till`
    pub fn new(name: &'static str, done_till: Timestamp) -> TransactionResult<Self> {
        let (sender, receiver) = channel::unbounded();
        let done_till = Arc::new(AtomicU64::new(done_till));

        let mut state = MarkState {
            name,
            done_till: done_till.clone(),
            pending: HashMap::new(),
            order: BinaryHeap::new(),
            waiters: BTreeMap::new(),
        };
        let worker = std::thread::Builder::new()
            .name(format!("ssikv-{}-mark", name))
            .spawn(move || state.run(receiver))?;

        Ok(Self {
            name,
            sender,
            done_till,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Record that processing for `ts` has started
    pub fn begin(&self, ts: Timestamp) {
        self.send(MarkMessage::Begin(ts));
    }

    /// Record that processing for `ts` has completed
    pub fn finish(&self, ts: Timestamp) {
        self.send(MarkMessage::Finish(ts));
    }

    /// Highest timestamp below which every started timestamp has finished
    pub fn done_till(&self) -> Timestamp {
        self.done_till.load(Ordering::Acquire)
    }

    /// Block until `done_till() >= ts`, or until `ctx` is cancelled or expires
    pub fn wait_for_mark(&self, ts: Timestamp, ctx: &WaitContext) -> TransactionResult<()> {
        if self.done_till() >= ts {
            return Ok(());
        }

        let (notify, notified) = channel::bounded(1);
        self.sender
            .send(MarkMessage::Wait { ts, notify })
            .map_err(|_| TransactionError::MarkClosed)?;

        let deadline = ctx
            .deadline
            .map(channel::at)
            .unwrap_or_else(channel::never);

        select! {
            recv(notified) -> result => result.map_err(|_| TransactionError::MarkClosed),
            recv(ctx.cancelled) -> _ => Err(TransactionError::Cancelled { ts }),
            recv(deadline) -> _ => Err(TransactionError::DeadlineExceeded { ts }),
        }
    }

    /// Stop the worker after it has processed everything sent so far.
    /// Outstanding waiters fail with `MarkClosed`.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = self.sender.send(MarkMessage::Stop);
            if worker.join().is_err() {
                log::warn!("{} mark worker panicked", self.name);
            }
        }
    }

    fn send(&self, message: MarkMessage) {
        if self.sender.send(message).is_err() {
            log::warn!("{} mark is closed; dropping update", self.name);
        }
    }
}

impl Drop for TransactionTimestampMark {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MarkState {
    name: &'static str,
    done_till: Arc<AtomicU64>,
    /// Outstanding (begun minus finished) count per timestamp
    pending: HashMap<Timestamp, i64>,
    /// Min-heap over timestamps present in `pending`
    order: BinaryHeap<Reverse<Timestamp>>,
    waiters: BTreeMap<Timestamp, Vec<Sender<()>>>,
}

impl MarkState {
    fn run(&mut self, receiver: Receiver<MarkMessage>) {
        for message in receiver.iter() {
            match message {
                MarkMessage::Begin(ts) => self.adjust(ts, 1),
                MarkMessage::Finish(ts) => self.adjust(ts, -1),
                MarkMessage::Wait { ts, notify } => {
                    if self.done_till.load(Ordering::Acquire) >= ts {
                        let _ = notify.send(());
                    } else {
                        self.waiters.entry(ts).or_default().push(notify);
                    }
                }
                MarkMessage::Stop => break,
            }
        }
        log::trace!(
            "{} mark stopped at {} with {} waiter group(s) outstanding",
            self.name,
            self.done_till.load(Ordering::Acquire),
            self.waiters.len()
        );
    }

    fn adjust(&mut self, ts: Timestamp, delta: i64) {
        let count = self.pending.entry(ts).or_insert_with(|| {
            self.order.push(Reverse(ts));
            0
        });
        *count += delta;
        log::trace!("{} mark: ts {} pending {}", self.name, ts, count);
        self.advance();
    }

    fn advance(&mut self) {
        let start = self.done_till.load(Ordering::Acquire);
        let mut until = start;

        while let Some(Reverse(lowest)) = self.order.peek().copied() {
            if self.pending.get(&lowest).copied().unwrap_or(0) > 0 {
                break;
            }
            self.order.pop();
            self.pending.remove(&lowest);
            until = until.max(lowest);
        }

        if until == start {
            return;
        }
        self.done_till.store(until, Ordering::Release);
        log::trace!("{} mark advanced {} -> {}", self.name, start, until);

        let ready = match until.checked_add(1) {
            Some(next) => {
                let still_waiting = self.waiters.split_off(&next);
                std::mem::replace(&mut self.waiters, still_waiting)
            }
            None => std::mem::take(&mut self.waiters),
        };
        for notify in ready.into_values().flatten() {
            let _ = notify.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_until(mark: &TransactionTimestampMark, ts: Timestamp) {
        mark.wait_for_mark(ts, &WaitContext::with_timeout(Duration::from_secs(5)))
            .unwrap();
    }

    #[test]
    fn test_done_till_advances_over_contiguous_finished_prefix() {
        let mark = TransactionTimestampMark::new("test", 0).unwrap();
        mark.begin(1);
        mark.begin(2);
        mark.begin(3);

        mark.finish(2);
        mark.finish(3);
        // Ts 1 still outstanding; a wait on 0 is satisfied immediately
        wait_until(&mark, 0);
        assert_eq!(mark.done_till(), 0);

        mark.finish(1);
        wait_until(&mark, 3);
        assert_eq!(mark.done_till(), 3);
    }

    #[test]
    fn test_repeated_timestamp_needs_every_finish() {
        let mark = TransactionTimestampMark::new("test", 0).unwrap();
        mark.begin(5);
        mark.begin(5);
        mark.finish(5);

        let ctx = WaitContext::with_timeout(Duration::from_millis(50));
        assert!(matches!(
            mark.wait_for_mark(5, &ctx),
            Err(TransactionError::DeadlineExceeded { ts: 5 })
        ));

        mark.finish(5);
        wait_until(&mark, 5);
    }

    #[test]
    fn test_wait_wakes_when_mark_passes() {
        let mark = Arc::new(TransactionTimestampMark::new("test", 0).unwrap());
        mark.begin(1);

        let waiter = {
            let mark = mark.clone();
            std::thread::spawn(move || mark.wait_for_mark(1, &WaitContext::background()))
        };
        std::thread::sleep(Duration::from_millis(20));
        mark.finish(1);

        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(mark.done_till(), 1);
    }

    #[test]
    fn test_cancelled_wait() {
        let mark = Arc::new(TransactionTimestampMark::new("test", 0).unwrap());
        mark.begin(1);

        let (ctx, cancel) = WaitContext::with_cancel();
        let waiter = {
            let mark = mark.clone();
            std::thread::spawn(move || mark.wait_for_mark(1, &ctx))
        };
        std::thread::sleep(Duration::from_millis(20));
        cancel.cancel();

        assert!(matches!(
            waiter.join().unwrap(),
            Err(TransactionError::Cancelled { ts: 1 })
        ));
        // The mark itself is untouched by the cancellation
        mark.finish(1);
        wait_until(&mark, 1);
    }

    #[test]
    fn test_context_state() {
        let (ctx, cancel) = WaitContext::with_cancel();
        assert!(!ctx.is_cancelled());
        drop(cancel);
        assert!(ctx.is_cancelled());

        let expired = WaitContext::background().deadline_at(Instant::now());
        assert!(expired.is_expired());
        assert!(!WaitContext::background().is_cancelled());
    }

    #[test]
    fn test_stop_releases_waiters() {
        let mark = Arc::new(TransactionTimestampMark::new("test", 0).unwrap());
        mark.begin(1);

        let waiter = {
            let mark = mark.clone();
            std::thread::spawn(move || mark.wait_for_mark(1, &WaitContext::background()))
        };
        std::thread::sleep(Duration::from_millis(20));
        mark.stop();

        assert!(matches!(
            waiter.join().unwrap(),
            Err(TransactionError::MarkClosed)
        ));
        assert!(matches!(
            mark.wait_for_mark(1, &WaitContext::background()),
            Err(TransactionError::MarkClosed)
        ));
    }
}
