//! Unit tests for the bounded stop ledger.

use uuid::Uuid;

use preflight_kit::orchestrator::stop_ledger::{StopLedger, DEFAULT_CAPACITY};

#[test]
fn default_capacity_is_one_hundred() {
    let ledger = StopLedger::default();
    assert_eq!(ledger.capacity(), DEFAULT_CAPACITY);
    assert_eq!(DEFAULT_CAPACITY, 100);
    assert!(ledger.is_empty());
}

#[test]
fn inserting_past_capacity_evicts_oldest() {
    let ledger = StopLedger::default();
    let ids: Vec<Uuid> = (0..101).map(|_| Uuid::new_v4()).collect();

    for id in &ids {
        ledger.record(*id, "heartbeat timeout");
    }

    assert_eq!(ledger.len(), 100);
    assert!(ledger.lookup(ids[0]).is_none(), "first record evicted");
    let retained: Vec<Uuid> = ledger
        .entries()
        .into_iter()
        .map(|record| record.execution_id)
        .collect();
    assert_eq!(retained, ids[1..], "last 100 kept in insertion order");
}

#[test]
fn lookup_returns_most_recent_record() {
    let ledger = StopLedger::new(10);
    let id = Uuid::new_v4();

    ledger.record(id, "heartbeat timeout");
    ledger.record(Uuid::new_v4(), "process shutdown");
    ledger.record(id, "process shutdown");

    let found = ledger.lookup(id).expect("present");
    assert_eq!(found.reason, "process shutdown");
}

#[test]
fn lookup_of_unknown_execution_is_none() {
    let ledger = StopLedger::new(4);
    ledger.record(Uuid::new_v4(), "heartbeat timeout");
    assert!(ledger.lookup(Uuid::new_v4()).is_none());
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let ledger = StopLedger::new(0);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    ledger.record(first, "a");
    ledger.record(second, "b");

    assert_eq!(ledger.capacity(), 1);
    assert_eq!(ledger.len(), 1);
    assert!(ledger.lookup(second).is_some());
}

#[test]
fn clear_drops_everything() {
    let ledger = StopLedger::new(3);
    ledger.record(Uuid::new_v4(), "a");
    ledger.clear();
    assert!(ledger.is_empty());
}

#[test]
fn concurrent_record_and_lookup() {
    let ledger = std::sync::Arc::new(StopLedger::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = std::sync::Arc::clone(&ledger);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let id = Uuid::new_v4();
                    ledger.record(id, "heartbeat timeout");
                    let _ = ledger.lookup(id);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread");
    }
    assert_eq!(ledger.len(), 100);
}
