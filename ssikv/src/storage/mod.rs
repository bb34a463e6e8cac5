// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned key/value storage
//!
//! This module provides:
//! - `VersionedKey` and the `Timestamp` type shared with the transaction core
//! - The `MemTable` trait the transaction executor writes through
//! - An in-memory backend and (behind `sled-backend`) a sled backend
//!
//! # Architecture
//!
//! ```text
//! Transactions / TransactionExecutor
//!     ↓
//! MemTable (ordered multi-version abstraction)
//!     ↓
//! Concrete Implementations (Memory, Sled)
//! ```

pub mod factory;
pub mod key;
pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled;
pub mod traits;
pub mod types;

pub use factory::create_memtable;
pub use key::{Timestamp, VersionedKey};
pub use memory::MemoryMemTable;
#[cfg(feature = "sled-backend")]
pub use self::sled::SledMemTable;
pub use traits::MemTable;
pub use types::{StorageError, StorageResult, StorageType, Value};
