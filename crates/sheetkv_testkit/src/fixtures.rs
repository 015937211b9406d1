//! Test fixtures and client helpers.
//!
//! Provides a small sample table and convenience constructors for clients
//! backed by in-memory adapters.

use sheetkv_core::{
    render_rows, Client, Config, Key, MemoryAdapter, MockAdapter, Record, RetryConfig,
    SyncStrategy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ages of the [`people`] fixture, in key order.
pub const PEOPLE_AGES: [i64; 5] = [15, 20, 25, 30, 35];

const PEOPLE_NAMES: [&str; 5] = ["Ann", "Ben", "Cleo", "Dan", "Eve"];

/// Five people at keys 2..=6 with `name`, `age` and `active` columns.
pub fn people() -> Vec<Record> {
    PEOPLE_NAMES
        .iter()
        .zip(PEOPLE_AGES)
        .enumerate()
        .map(|(i, (name, age))| {
            Record::new(i as Key + 2)
                .with_value("name", *name)
                .with_value("age", age)
                .with_value("active", age >= 18)
        })
        .collect()
}

/// Column order of the [`people`] table.
pub fn people_schema() -> Vec<String> {
    vec!["name".into(), "age".into(), "active".into()]
}

/// Manual sync, a single attempt per adapter call.
pub fn manual_config() -> Config {
    Config::new()
        .manual_sync()
        .with_retry(RetryConfig::no_retry())
}

/// Retries without delay, `max_retries` times.
pub fn fast_retry_config(max_retries: u32) -> Config {
    Config::new().manual_sync().with_retry(
        RetryConfig::new(max_retries)
            .with_retry_interval(Duration::ZERO)
            .with_max_backoff(Duration::ZERO),
    )
}

/// Creates a sheet holding `records` at their row positions.
pub fn memory_sheet(records: &[Record], schema: &[String]) -> Arc<MemoryAdapter> {
    Arc::new(MemoryAdapter::with_rows(render_rows(
        records,
        schema,
        SyncStrategy::RowPreserving,
    )))
}

/// Creates an initialized, manually synced client over a sheet seeded with
/// `records`. The sheet handle is returned for inspection.
pub fn memory_client(records: &[Record]) -> (Client<Arc<MemoryAdapter>>, Arc<MemoryAdapter>) {
    let sheet = memory_sheet(records, &columns_of(records));
    let client =
        Client::new(Arc::clone(&sheet), manual_config()).expect("Failed to create client");
    client.initialize().expect("Failed to load sheet");
    (client, sheet)
}

/// Creates a manually synced client over `mock` without loading.
pub fn mock_client(mock: &Arc<MockAdapter>) -> Client<Arc<MockAdapter>> {
    Client::new(Arc::clone(mock), manual_config()).expect("Failed to create client")
}

/// Polls `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns whether it held.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn columns_of(records: &[Record]) -> Vec<String> {
    let mut schema: Vec<String> = Vec::new();
    for record in records {
        for column in record.columns() {
            if !schema.iter().any(|c| c == column) {
                schema.push(column.to_string());
            }
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn people_fixture_shape() {
        let people = people();
        assert_eq!(people.len(), 5);
        assert_eq!(people[0].key, 2);
        assert_eq!(people[4].key, 6);
        assert_eq!(people[2].get_as_i64("age", 0), 25);
        assert!(!people[0].get_as_bool("active", true));
    }

    #[test]
    fn memory_client_loads_fixture() {
        let (client, sheet) = memory_client(&people());
        assert_eq!(client.len(), 5);
        assert_eq!(sheet.row_count(), 6);
        assert_eq!(client.get(4).unwrap().get_as_string("name", ""), "Cleo");
    }
}
