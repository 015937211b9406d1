//! Property-based test generators using proptest.
//!
//! Provides strategies for values, records and sequences of cache
//! mutations.

use chrono::DateTime;
use proptest::prelude::*;
use sheetkv_core::{Key, Record, Value};
use std::collections::BTreeMap;

/// Upper bound (exclusive) of generated keys. Small, so operations collide.
pub const MAX_TEST_KEY: Key = 24;

/// Strategy for data-row keys.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    2..MAX_TEST_KEY
}

/// Strategy for column names.
pub fn column_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["name", "age", "score", "tags", "active", "joined"])
        .prop_map(str::to_string)
}

/// Strategy for any value variant.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Text),
        (-1_000_000i64..1_000_000).prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        any::<bool>().prop_map(Value::Bool),
        prop::collection::vec("[a-z]{1,6}", 0..4).prop_map(Value::List),
        (0i64..4_000_000_000).prop_map(|secs| {
            Value::Timestamp(DateTime::from_timestamp(secs, 0).unwrap_or_default())
        }),
    ]
}

/// Strategy for values that read back unchanged from a grid cell.
///
/// Floats, lists and timestamps are excluded because their cell form parses
/// back as another variant.
pub fn cell_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,8}"
            .prop_filter("parses as a bool", |s| s != "true" && s != "false")
            .prop_map(Value::Text),
        (-1_000_000i64..1_000_000).prop_map(Value::Integer),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn record_with(
    values: impl Strategy<Value = Value>,
) -> impl Strategy<Value = Record> {
    (
        key_strategy(),
        prop::collection::btree_map(column_name_strategy(), values, 1..5),
    )
        .prop_map(|(key, values): (Key, BTreeMap<String, Value>)| Record { key, values })
}

/// Strategy for records with one to four columns.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    record_with(value_strategy())
}

/// Strategy for records whose values survive a grid round trip.
pub fn cell_record_strategy() -> impl Strategy<Value = Record> {
    record_with(cell_value_strategy())
}

/// A single cache mutation.
#[derive(Debug, Clone)]
pub enum CacheOp {
    /// Upsert a record.
    Set(Record),
    /// Delete a key (may be absent).
    Delete(Key),
    /// Set or remove one column of a key (may be absent).
    Update(Key, String, Option<Value>),
}

impl CacheOp {
    /// The key this operation targets.
    pub fn key(&self) -> Key {
        match self {
            CacheOp::Set(record) => record.key,
            CacheOp::Delete(key) | CacheOp::Update(key, _, _) => *key,
        }
    }
}

/// Strategy for a single cache mutation with grid-safe values.
pub fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => cell_record_strategy().prop_map(CacheOp::Set),
        2 => key_strategy().prop_map(CacheOp::Delete),
        1 => (
            key_strategy(),
            column_name_strategy(),
            prop::option::of(cell_value_strategy())
        )
            .prop_map(|(key, column, value)| CacheOp::Update(key, column, value)),
    ]
}

/// Strategy for a sequence of up to `max_len` cache mutations.
pub fn cache_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<CacheOp>> {
    prop::collection::vec(cache_op_strategy(), 0..max_len)
}
