// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! ssikv - An embedded multi-version key-value transaction engine
//!
//! ssikv layers optimistic transactions with serializable snapshot isolation
//! over a versioned key-value store.
//!
//! # Features
//!
//! - **Snapshot Reads**: Every transaction reads a consistent snapshot fixed at begin
//! - **Serializable Commits**: Read-write conflicts abort the later committer
//! - **Ordered Application**: Commits are applied to storage in timestamp order
//! - **Pluggable Storage**: In-memory BTreeMap or embedded Sled backend
//!
//! # Usage
//!
//! ```ignore
//! use ssikv::Oracle;
//!
//! let oracle = Oracle::in_memory()?;
//!
//! let mut txn = oracle.new_read_write_transaction();
//! txn.put("balance/alice", "100")?;
//! txn.commit()?.wait()?;
//!
//! let snapshot = oracle.new_readonly_transaction();
//! assert_eq!(snapshot.get("balance/alice")?, Some(b"100".to_vec()));
//! ```

pub mod config;
pub mod storage;
pub mod txn;

pub use config::OracleConfig;
pub use storage::{MemTable, StorageError, StorageType, Timestamp, Value, VersionedKey};
pub use txn::{
    Batch, CompletionHandle, IsolationLevel, Oracle, OracleStatistics, ReadWriteTransaction,
    ReadonlyTransaction, TransactionError, TransactionResult, TransactionStatus, WaitContext,
};

/// ssikv version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ssikv crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
