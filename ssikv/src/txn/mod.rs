// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction processing
//!
//! Optimistic multi-version transactions with serializable snapshot
//! isolation. Every transaction reads a snapshot fixed at its begin
//! timestamp; read-write transactions buffer their writes and are validated
//! by the [`Oracle`] at commit, then applied in commit-timestamp order by the
//! [`TransactionExecutor`].
//!
//! # Components
//! - [`Oracle`]: timestamp issuance, conflict detection, committed-record cleanup
//! - [`TransactionTimestampMark`]: watermarks over begin and commit timestamps
//! - [`TransactionExecutor`]: background application of committed batches
//! - [`ReadonlyTransaction`] / [`ReadWriteTransaction`]: client handles

pub mod batch;
pub mod error;
pub mod executor;
pub mod isolation;
pub mod mark;
pub mod oracle;
pub mod read_write;
pub mod readonly;
pub mod state;

pub use batch::{Batch, CompletionHandle, TimestampedBatch};
pub use error::{TransactionError, TransactionResult};
pub use executor::TransactionExecutor;
pub use isolation::IsolationLevel;
pub use mark::{CancelHandle, TransactionTimestampMark, WaitContext};
pub use oracle::{Oracle, OracleStatistics};
pub use read_write::ReadWriteTransaction;
pub use readonly::ReadonlyTransaction;
pub use state::{AccessMode, TransactionId, TransactionStatus};
