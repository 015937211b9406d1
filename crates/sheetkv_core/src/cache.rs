//! In-memory record cache with dirty tracking.
//!
//! The cache is the authoritative copy of the table while a client is open.
//! Every mutation is stamped with a sequence number so that a save can clear
//! exactly the changes it persisted: a write that lands while a save is in
//! flight carries a newer stamp and stays pending.
//!
//! Deleted keys are not kept as tombstones in the record map. A save always
//! rewrites the full table, so a key that is absent from the snapshot is
//! removed from the backing store. The cache only remembers that *some*
//! deletion is pending, so that a delete-only change set still triggers a
//! save.

use crate::error::{SheetKvError, SheetKvResult};
use crate::query::{apply_query, validate_query, Query};
use crate::record::{Key, Record, MIN_KEY};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A consistent view of the cache taken for one save.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// All records, ascending by key.
    pub records: Vec<Record>,
    /// Column names in order.
    pub schema: Vec<String>,
    /// Sequence number of the last mutation included in the snapshot.
    pub seq: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    data: BTreeMap<Key, Record>,
    /// Present keys changed since the last save, with the stamp of their last change.
    dirty: BTreeMap<Key, u64>,
    /// Deleted keys not yet persisted, with the stamp of the deletion.
    removed: BTreeMap<Key, u64>,
    schema: Vec<String>,
    seq: u64,
}

impl CacheInner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn mark_dirty(&mut self, key: Key) {
        let seq = self.next_seq();
        self.dirty.insert(key, seq);
        self.removed.remove(&key);
    }

    fn extend_schema(&mut self, record: &Record) {
        for column in record.columns() {
            if !self.schema.iter().any(|c| c == column) {
                self.schema.push(column.to_string());
            }
        }
    }

    fn store(&mut self, record: Record) {
        self.extend_schema(&record);
        self.mark_dirty(record.key);
        self.data.insert(record.key, record);
    }
}

/// In-memory table of records keyed by row number.
///
/// All accessors return copies; mutating a returned record never changes the
/// cache.
///
/// # Thread Safety
///
/// A single read/write lock guards the records, the dirty set and the schema.
#[derive(Debug, Default)]
pub struct Cache {
    inner: RwLock<CacheInner>,
}

fn check_key(key: Key) -> SheetKvResult<()> {
    if key < MIN_KEY {
        return Err(SheetKvError::InvalidKey { key });
    }
    Ok(())
}

impl Cache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the record stored under `key`.
    pub fn get(&self, key: Key) -> SheetKvResult<Record> {
        self.inner
            .read()
            .data
            .get(&key)
            .cloned()
            .ok_or(SheetKvError::KeyNotFound { key })
    }

    /// Stores a record under `key`, replacing any existing one.
    ///
    /// The record's own key is overwritten with `key`.
    pub fn set(&self, key: Key, mut record: Record) -> SheetKvResult<()> {
        check_key(key)?;
        record.key = key;
        self.inner.write().store(record);
        Ok(())
    }

    /// Stores a new record under its own key.
    ///
    /// # Errors
    ///
    /// Returns [`SheetKvError::DuplicateKey`] if the key is taken.
    pub fn append(&self, record: Record) -> SheetKvResult<()> {
        check_key(record.key)?;
        let mut inner = self.inner.write();
        if inner.data.contains_key(&record.key) {
            return Err(SheetKvError::DuplicateKey { key: record.key });
        }
        inner.store(record);
        Ok(())
    }

    /// Merges `updates` into an existing record.
    ///
    /// A `None` value removes the column from the record.
    pub fn update(&self, key: Key, updates: HashMap<String, Option<Value>>) -> SheetKvResult<()> {
        let mut inner = self.inner.write();
        let mut record = inner
            .data
            .get(&key)
            .cloned()
            .ok_or(SheetKvError::KeyNotFound { key })?;

        for (column, value) in updates {
            match value {
                Some(value) => {
                    record.values.insert(column, value);
                }
                None => {
                    record.values.remove(&column);
                }
            }
        }

        inner.store(record);
        Ok(())
    }

    /// Removes a record.
    pub fn delete(&self, key: Key) -> SheetKvResult<()> {
        let mut inner = self.inner.write();
        if inner.data.remove(&key).is_none() {
            return Err(SheetKvError::KeyNotFound { key });
        }
        inner.dirty.remove(&key);
        let seq = inner.next_seq();
        inner.removed.insert(key, seq);
        Ok(())
    }

    /// Validates and evaluates a query against all records.
    ///
    /// Results come back in ascending key order.
    pub fn query(&self, query: &Query) -> SheetKvResult<Vec<Record>> {
        validate_query(query)?;
        let records = self.all_records();
        Ok(apply_query(records, query))
    }

    /// Replaces all records and the schema. Pending changes are discarded.
    pub fn load(&self, records: Vec<Record>, schema: Vec<String>) {
        let mut inner = self.inner.write();
        inner.data = records.into_iter().map(|r| (r.key, r)).collect();
        inner.dirty.clear();
        inner.removed.clear();
        inner.schema = schema;
    }

    /// Returns all records sorted ascending by key.
    pub fn all_records(&self) -> Vec<Record> {
        self.inner.read().data.values().cloned().collect()
    }

    /// Returns the keys changed since the last save, ascending.
    ///
    /// Deleted keys are not reported here; see [`Cache::has_pending_changes`].
    pub fn dirty_keys(&self) -> Vec<Key> {
        self.inner.read().dirty.keys().copied().collect()
    }

    /// Returns true if any write or delete has not been saved yet.
    pub fn has_pending_changes(&self) -> bool {
        let inner = self.inner.read();
        !inner.dirty.is_empty() || !inner.removed.is_empty()
    }

    /// Returns true if the keys are not contiguous from row 2.
    ///
    /// A row-preserving save of such a cache leaves blank rows behind.
    pub fn has_gaps(&self) -> bool {
        self.inner
            .read()
            .data
            .keys()
            .zip(MIN_KEY..)
            .any(|(key, expected)| *key != expected)
    }

    /// Marks everything as saved.
    pub fn clear_dirty(&self) {
        let mut inner = self.inner.write();
        inner.dirty.clear();
        inner.removed.clear();
    }

    /// Marks the changes included in a snapshot as saved.
    ///
    /// Changes stamped after `seq` stay pending.
    pub fn mark_clean(&self, seq: u64) {
        let mut inner = self.inner.write();
        inner.dirty.retain(|_, stamp| *stamp > seq);
        inner.removed.retain(|_, stamp| *stamp > seq);
    }

    /// Takes records, schema and the current stamp under one lock.
    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.read();
        CacheSnapshot {
            records: inner.data.values().cloned().collect(),
            schema: inner.schema.clone(),
            seq: inner.seq,
        }
    }

    /// Returns a copy of the schema.
    pub fn schema(&self) -> Vec<String> {
        self.inner.read().schema.clone()
    }

    /// Replaces the schema.
    pub fn set_schema(&self, schema: Vec<String>) {
        self.inner.write().schema = schema;
    }

    /// Returns the largest key, if any.
    pub fn max_key(&self) -> Option<Key> {
        self.inner.read().data.keys().next_back().copied()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    /// Returns true if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Removes all records, pending changes and the schema.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        // stamps stay monotonic across clears
        let seq = inner.seq;
        *inner = CacheInner {
            seq,
            ..CacheInner::default()
        };
    }
}

/// Merges the in-memory schema with the schema found in the backing store.
///
/// Backing-store columns that still exist are kept in the backing store's
/// order; columns only known in memory are appended in their current order.
pub fn merge_schemas(current: &[String], sheet: &[String]) -> Vec<String> {
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(current.len());

    for column in sheet {
        if current_set.contains(column.as_str()) && seen.insert(column.as_str()) {
            merged.push(column.clone());
        }
    }
    for column in current {
        if seen.insert(column.as_str()) {
            merged.push(column.clone());
        }
    }

    merged
}
