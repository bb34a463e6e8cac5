// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction error types

use super::state::{TransactionId, TransactionStatus};
use crate::storage::{StorageError, Timestamp};
use thiserror::Error;

/// Errors surfaced by the oracle, transactions and the executor
#[derive(Error, Debug)]
pub enum TransactionError {
    /// A transaction that committed after `begin_ts` wrote a key this transaction
    /// depends on. Retry the whole transaction with a fresh begin timestamp.
    #[error("Conflict: a transaction committed after begin timestamp {begin_ts} touched keys this transaction depends on")]
    Conflict { begin_ts: Timestamp },

    #[error("Transaction has no buffered writes to commit")]
    EmptyTransaction,

    #[error("Key {} is already written in this transaction", String::from_utf8_lossy(.key))]
    DuplicateKey { key: Vec<u8> },

    #[error("Wait for timestamp {ts} was cancelled")]
    Cancelled { ts: Timestamp },

    #[error("Wait for timestamp {ts} exceeded its deadline")]
    DeadlineExceeded { ts: Timestamp },

    #[error("Timestamp mark is closed")]
    MarkClosed,

    #[error("Transaction {id} is not active (status: {status})")]
    NotActive {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("Transaction executor halted: {0}")]
    ExecutorHalted(String),

    #[error("Oracle is shut down")]
    OracleClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransactionError {
    /// Whether retrying the whole transaction may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransactionError::Conflict { .. })
    }
}

/// Result type for transaction operations
pub type TransactionResult<T> = Result<T, TransactionError>;
