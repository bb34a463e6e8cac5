//! Oracle fixture for ssikv integration tests
//!
//! Uses only the public crate API.

use ssikv::{Oracle, OracleConfig, StorageType, Timestamp, TransactionError};
use std::sync::Arc;

/// Initialise test logging once per test binary; honours RUST_LOG
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

/// Oracle with an isolated store
pub struct OracleFixture {
    oracle: Arc<Oracle>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl OracleFixture {
    /// Default configuration over an in-memory store
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(OracleConfig::default())
    }

    /// In-memory store with a custom configuration
    pub fn with_config(config: OracleConfig) -> Result<Self, Box<dyn std::error::Error>> {
        init_logging();
        let oracle = Oracle::new(config, Arc::new(ssikv::storage::MemoryMemTable::new()))?;
        Ok(Self {
            oracle,
            _temp_dir: None,
        })
    }

    /// Sled store in a fresh temporary directory
    pub fn sled() -> Result<Self, Box<dyn std::error::Error>> {
        init_logging();
        let temp_dir = tempfile::tempdir()?;
        let db_path = temp_dir.path().join("ssikv_test");

        let config = OracleConfig::default().with_storage_type(StorageType::Sled);
        let oracle = Oracle::open(config, Some(&db_path))?;
        Ok(Self {
            oracle,
            _temp_dir: Some(temp_dir),
        })
    }

    pub fn oracle(&self) -> &Arc<Oracle> {
        &self.oracle
    }

    /// Commit `pairs` in one transaction and wait until they are applied
    pub fn commit(&self, pairs: &[(&str, &str)]) -> Result<Timestamp, TransactionError> {
        let mut txn = self.oracle.new_read_write_transaction();
        for (key, value) in pairs {
            txn.put(*key, *value)?;
        }
        txn.commit()?.wait()
    }

    /// Read `key` in a fresh snapshot as UTF-8
    pub fn read(&self, key: &str) -> Option<String> {
        self.oracle
            .new_readonly_transaction()
            .get(key)
            .expect("snapshot read failed")
            .map(|bytes| String::from_utf8(bytes).expect("value is not UTF-8"))
    }
}
