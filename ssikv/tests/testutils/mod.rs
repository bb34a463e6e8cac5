//! Test utilities for ssikv integration tests
//!
//! - OracleFixture: an oracle over a fresh store (in-memory or sled in a temp dir)
//! - GatedMemTable: an in-memory store whose batch application can be held back

#![allow(dead_code)]

pub mod gated_memtable;
pub mod oracle_fixture;
