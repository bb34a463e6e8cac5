//! Transactions over the sled-backed MemTable

#![cfg(feature = "sled-backend")]

#[path = "testutils/mod.rs"]
mod testutils;

use ssikv::{Oracle, OracleConfig, StorageType};
use testutils::oracle_fixture::{init_logging, OracleFixture};

#[test]
fn test_sled_snapshot_reads() {
    let fixture = OracleFixture::sled().expect("Failed to create fixture");
    let oracle = fixture.oracle();
    assert_eq!(oracle.memtable().storage_type(), StorageType::Sled);

    fixture.commit(&[("user/1", "ada"), ("user/10", "grace")]).unwrap();
    let before = oracle.new_readonly_transaction();
    fixture.commit(&[("user/1", "alan")]).unwrap();

    assert_eq!(before.get("user/1").unwrap(), Some(b"ada".to_vec()));
    assert_eq!(fixture.read("user/1").as_deref(), Some("alan"));
    assert_eq!(fixture.read("user/10").as_deref(), Some("grace"));
    assert_eq!(fixture.read("user/2"), None);

    let versions = oracle.memtable().versions(b"user/1").unwrap();
    assert_eq!(
        versions.iter().map(|(ts, _)| *ts).collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[test]
fn test_sled_data_survives_reopen() {
    init_logging();
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("reopen_db");
    let config = OracleConfig::default().with_storage_type(StorageType::Sled);

    {
        let oracle = Oracle::open(config.clone(), Some(&db_path)).unwrap();
        let mut txn = oracle.new_read_write_transaction();
        txn.put("persisted", "yes").unwrap();
        txn.commit().unwrap().wait().unwrap();
        oracle.shutdown();
    }

    // Oracle timestamps are not persisted; start past the old commits
    let oracle = Oracle::open(config.with_initial_commit_timestamp(100), Some(&db_path)).unwrap();
    let snapshot = oracle.new_readonly_transaction();
    assert_eq!(snapshot.begin_ts(), 99);
    assert_eq!(snapshot.get("persisted").unwrap(), Some(b"yes".to_vec()));
}

#[test]
fn test_sled_requires_path() {
    let config = OracleConfig::default().with_storage_type(StorageType::Sled);
    assert!(matches!(
        Oracle::open(config, None),
        Err(ssikv::TransactionError::Storage(ssikv::StorageError::InvalidPath(_)))
    ));
}
