//! Cancellable and deadline-bounded transaction begins

#[path = "testutils/mod.rs"]
mod testutils;

use ssikv::{Oracle, OracleConfig, TransactionError, WaitContext};
use std::sync::Arc;
use std::time::{Duration, Instant};
use testutils::gated_memtable::GatedMemTable;
use testutils::oracle_fixture::init_logging;

#[test]
fn test_begin_waits_for_pending_commit() {
    init_logging();
    let (memtable, release) = GatedMemTable::new();
    let oracle = Oracle::new(OracleConfig::default(), Arc::new(memtable)).unwrap();

    let mut writer = oracle.new_read_write_transaction();
    writer.put("k", "v").unwrap();
    let handle = writer.commit().unwrap();

    // Commit 1 is issued but held back from storage, so a snapshot at 1 must wait
    let (ctx, cancel) = WaitContext::with_cancel();
    let waiter = {
        let oracle = oracle.clone();
        std::thread::spawn(move || oracle.new_readonly_transaction_with(&ctx).map(|t| t.begin_ts()))
    };
    std::thread::sleep(Duration::from_millis(20));
    cancel.cancel();
    assert!(matches!(
        waiter.join().unwrap(),
        Err(TransactionError::Cancelled { ts: 1 })
    ));

    let expired = WaitContext::with_timeout(Duration::from_millis(30));
    assert!(matches!(
        oracle.new_read_write_transaction_with(&expired),
        Err(TransactionError::DeadlineExceeded { ts: 1 })
    ));

    release.send(()).unwrap();
    assert_eq!(handle.wait().unwrap(), 1);

    let ctx = WaitContext::with_timeout(Duration::from_secs(5));
    let mut txn = oracle.new_read_write_transaction_with(&ctx).unwrap();
    assert_eq!(txn.begin_ts(), 1);
    assert_eq!(txn.get("k").unwrap(), Some(b"v".to_vec()));
    drop(txn);

    // Cancelled and expired begins released their begin timestamps too
    let deadline = Instant::now() + Duration::from_secs(5);
    while oracle.begin_done_till() < 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(oracle.begin_done_till(), 1);
}

#[test]
fn test_already_cancelled_context_is_ignored_when_snapshot_is_ready() {
    init_logging();
    let oracle = Oracle::in_memory().unwrap();

    let (ctx, cancel) = WaitContext::with_cancel();
    drop(cancel);
    assert!(ctx.is_cancelled());

    // Nothing is pending, so the wait returns before looking at the context
    let snapshot = oracle.new_readonly_transaction_with(&ctx).unwrap();
    assert_eq!(snapshot.begin_ts(), 0);
}
