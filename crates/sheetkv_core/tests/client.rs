//! Client integration tests against the in-memory grid adapter.

use chrono::{TimeZone, Utc};
use sheetkv_core::{
    is_blank, AdapterError, Client, MemoryAdapter, MockAdapter, Query, Record, SaveOutcome,
    SheetKvError, SyncStrategy, Value,
};
use sheetkv_testkit::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn named(name: &str) -> Record {
    Record::default().with_value("name", name)
}

fn cell(sheet: &MemoryAdapter, row: usize) -> Vec<String> {
    sheet.row(row).unwrap_or_default()
}

#[test]
fn get_reflects_last_write() {
    let (client, _sheet) = memory_client(&[]);

    client.set(2, named("first")).unwrap();
    client.set(2, named("second")).unwrap();
    assert_eq!(client.get(2).unwrap().get_as_string("name", ""), "second");

    let mut updates = HashMap::new();
    updates.insert("name".to_string(), Some(Value::from("third")));
    client.update(2, updates).unwrap();
    assert_eq!(client.get(2).unwrap().get_as_string("name", ""), "third");

    client.delete(2).unwrap();
    assert!(matches!(
        client.get(2),
        Err(SheetKvError::KeyNotFound { key: 2 })
    ));
}

#[test]
fn returned_records_are_copies() {
    let (client, _sheet) = memory_client(&[]);
    client.set(2, named("a")).unwrap();

    let mut copy = client.get(2).unwrap();
    copy.set_string("name", "changed");
    assert_eq!(client.get(2).unwrap().get_as_string("name", ""), "a");
}

#[test]
fn append_never_reuses_a_present_key() {
    let (client, _sheet) = memory_client(&people());

    assert_eq!(client.append(named("f")).unwrap(), 7);

    // deleting a middle key does not make it available
    client.delete(4).unwrap();
    assert_eq!(client.append(named("g")).unwrap(), 8);

    // deleting the max key lets the next append take it again
    client.delete(8).unwrap();
    assert_eq!(client.append(named("h")).unwrap(), 8);
}

#[test]
fn append_on_empty_table_starts_at_row_two() {
    let (client, _sheet) = memory_client(&[]);
    assert_eq!(client.append(named("a")).unwrap(), 2);
}

#[test]
fn set_rejects_header_row() {
    let (client, _sheet) = memory_client(&[]);
    assert!(matches!(
        client.set(1, named("a")),
        Err(SheetKvError::InvalidKey { key: 1 })
    ));
    assert!(matches!(
        client.set(0, named("a")),
        Err(SheetKvError::InvalidKey { key: 0 })
    ));
}

#[test]
fn age_range_query() {
    let (client, _sheet) = memory_client(&people());

    let query = Query::new()
        .filter("age", ">=", 20i64)
        .filter("age", "<=", 30i64);
    let results = client.query(&query).unwrap();

    let ages: Vec<i64> = results.iter().map(|r| r.get_as_i64("age", 0)).collect();
    assert_eq!(ages, vec![20, 25, 30]);
    let keys: Vec<u32> = results.iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![3, 4, 5]);
}

#[test]
fn query_pagination() {
    let (client, _sheet) = memory_client(&people());

    let page = client.query(&Query::new().offset(1).limit(2)).unwrap();
    let keys: Vec<u32> = page.iter().map(|r| r.key).collect();
    assert_eq!(keys, vec![3, 4]);

    assert!(client.query(&Query::new().offset(10)).unwrap().is_empty());
    assert!(matches!(
        client.query(&Query::new().limit(-1)),
        Err(SheetKvError::InvalidQuery { .. })
    ));
}

#[test]
fn list_and_time_survive_a_sheet_round_trip() {
    let (client, sheet) = memory_client(&[]);
    let joined = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap();

    let mut record = Record::default();
    record.set_strings("tags", &["a", "b"]);
    record.set_time("joined", joined);
    assert_eq!(record.get_as_strings("tags", &[]), vec!["a", "b"]);
    assert_eq!(record.get_as_time("joined", Utc::now()), joined);

    let key = client.append(record).unwrap();
    client.close().unwrap();

    let reopened = Client::new(Arc::clone(&sheet), manual_config()).unwrap();
    reopened.initialize().unwrap();
    let loaded = reopened.get(key).unwrap();
    assert_eq!(loaded.get_as_strings("tags", &[]), vec!["a", "b"]);
    assert_eq!(loaded.get_as_time("joined", Utc::now()), joined);
}

#[test]
fn row_preserving_then_compacting_layout() {
    let (client, sheet) = memory_client(&[]);
    for name in ["r2", "r3", "r4", "r5", "r6"] {
        client.append(named(name)).unwrap();
    }
    client.sync().unwrap();
    assert_eq!(sheet.row_count(), 6);

    client.delete(3).unwrap();
    client.delete(5).unwrap();
    assert_eq!(client.sync().unwrap(), SaveOutcome::Saved { records: 3 });

    assert_eq!(cell(&sheet, 2), vec!["r2"]);
    assert!(is_blank(&cell(&sheet, 3)));
    assert_eq!(cell(&sheet, 4), vec!["r4"]);
    assert!(is_blank(&cell(&sheet, 5)));
    assert_eq!(cell(&sheet, 6), vec!["r6"]);

    // nothing pending, but the gaps make close rewrite the sheet compacted
    client.close().unwrap();
    assert_eq!(cell(&sheet, 2), vec!["r2"]);
    assert_eq!(cell(&sheet, 3), vec!["r4"]);
    assert_eq!(cell(&sheet, 4), vec!["r6"]);
    assert_eq!(sheet.row_count(), 4);
    assert!(sheet.row(5).is_none());
}

#[test]
fn failed_save_keeps_changes_pending() {
    let mock = Arc::new(MockAdapter::new());
    let client = mock_client(&mock);
    client.set(2, named("a")).unwrap();
    client.set(3, named("b")).unwrap();

    mock.fail_saves(1, AdapterError::transient("503"));
    let err = client.sync().unwrap_err();
    assert!(matches!(err, SheetKvError::SyncFailed { retries: 0, .. }));
    assert_eq!(client.dirty_keys(), vec![2, 3]);

    client.sync().unwrap();
    assert!(client.dirty_keys().is_empty());
    assert_eq!(mock.save_calls(), 2);
}

#[test]
fn transient_failures_are_retried() {
    let mock = Arc::new(MockAdapter::new());
    let client = Client::new(Arc::clone(&mock), fast_retry_config(3)).unwrap();
    client.set(2, named("a")).unwrap();

    mock.fail_saves(2, AdapterError::transient("rate limited"));
    assert_eq!(client.sync().unwrap(), SaveOutcome::Saved { records: 1 });
    assert_eq!(mock.save_calls(), 3);
    assert_eq!(client.stats().retries, 2);
}

#[test]
fn exhausted_retries_report_count() {
    let mock = Arc::new(MockAdapter::new());
    let client = Client::new(Arc::clone(&mock), fast_retry_config(2)).unwrap();
    client.set(2, named("a")).unwrap();

    mock.fail_saves(5, AdapterError::transient("down"));
    match client.sync() {
        Err(SheetKvError::SyncFailed { retries, source }) => {
            assert_eq!(retries, 2);
            assert_eq!(source, AdapterError::transient("down"));
        }
        other => panic!("expected SyncFailed, got {other:?}"),
    }
    assert_eq!(mock.save_calls(), 3);
    assert_eq!(client.dirty_keys(), vec![2]);
}

#[test]
fn fatal_failure_is_not_retried() {
    let mock = Arc::new(MockAdapter::new());
    let client = Client::new(Arc::clone(&mock), fast_retry_config(3)).unwrap();
    client.set(2, named("a")).unwrap();

    mock.fail_saves(1, AdapterError::fatal("sheet deleted"));
    assert!(client.sync().is_err());
    assert_eq!(mock.save_calls(), 1);
}

#[test]
fn load_failure_is_retried_then_reported() {
    let mock = Arc::new(MockAdapter::with_table(people(), people_schema()));
    let client = Client::new(Arc::clone(&mock), fast_retry_config(1)).unwrap();

    mock.fail_loads(1, AdapterError::transient("timeout"));
    assert_eq!(client.initialize().unwrap(), 5);

    mock.fail_loads(2, AdapterError::transient("timeout"));
    assert!(client.initialize().unwrap_err().is_sync_failure());
    assert_eq!(client.len(), 5);
}

#[test]
fn close_saves_exactly_once_without_scheduler() {
    let mock = Arc::new(MockAdapter::new());
    let client = mock_client(&mock);
    assert!(!client.config().scheduler_enabled());

    client.set(2, named("a")).unwrap();
    client.delete(2).unwrap();
    client.set(3, named("b")).unwrap();

    client.close().unwrap();
    client.close().unwrap();
    assert_eq!(mock.save_calls(), 1);

    let saved = mock.last_save().unwrap();
    assert_eq!(saved.strategy, SyncStrategy::Compacting);
    assert_eq!(saved.records.len(), 1);
    assert_eq!(saved.records[0].key, 3);
}

#[test]
fn close_error_is_propagated() {
    let mock = Arc::new(MockAdapter::new());
    let client = mock_client(&mock);
    client.set(2, named("a")).unwrap();

    mock.fail_saves(1, AdapterError::fatal("permission denied"));
    assert!(client.close().is_err());
    assert!(client.is_closed());
    assert!(matches!(client.get(2), Err(SheetKvError::ClientClosed)));
}

#[test]
fn delete_only_change_set_is_saved() {
    let (client, sheet) = memory_client(&people());
    client.delete(6).unwrap();
    assert!(client.dirty_keys().is_empty());

    assert_eq!(client.sync().unwrap(), SaveOutcome::Saved { records: 4 });
    assert_eq!(sheet.row_count(), 5);
}

#[test]
fn new_columns_extend_the_header() {
    let (client, sheet) = memory_client(&people());
    let mut record = client.get(2).unwrap();
    record.set_string("email", "ann@example.com");
    client.set(2, record).unwrap();
    client.sync().unwrap();

    let header = cell(&sheet, 1);
    assert_eq!(header.last().map(String::as_str), Some("email"));
    assert!(client.schema().contains(&"email".to_string()));
}
