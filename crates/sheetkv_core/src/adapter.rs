//! Backing-store adapter abstraction.

use crate::error::{AdapterError, AdapterResult};
use crate::record::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// How a full-table save lays out rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Rows stay at their key; rows of deleted records are written blank.
    RowPreserving,
    /// Rows are written contiguously from row 2 and trailing rows are cleared.
    Compacting,
}

/// Kind of a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Insert a new row. Fails if the key exists.
    Add,
    /// Merge values into an existing row. Fails if the key is missing.
    Update,
    /// Remove a row. Fails if the key is missing.
    Delete,
}

/// A single operation of a [`Adapter::batch_apply`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Target record; only the key matters for deletes.
    pub record: Record,
}

impl Operation {
    /// Creates an add operation.
    pub fn add(record: Record) -> Self {
        Self {
            kind: OperationKind::Add,
            record,
        }
    }

    /// Creates an update operation.
    pub fn update(record: Record) -> Self {
        Self {
            kind: OperationKind::Update,
            record,
        }
    }

    /// Creates a delete operation.
    pub fn delete(key: u32) -> Self {
        Self {
            kind: OperationKind::Delete,
            record: Record::new(key),
        }
    }
}

/// Cooperative cancellation signal shared between a caller and adapter calls.
///
/// Cloning the token shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns [`AdapterError::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> AdapterResult<()> {
        if self.is_cancelled() {
            Err(AdapterError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A backing store holding one table: a header row of column names followed
/// by data rows.
///
/// Row numbers are record keys, so row 2 holds the record with key 2.
///
/// # Invariants
///
/// - `load` returns every non-blank data row keyed by its row number
/// - `save` rewrites the whole table; records absent from `records` must not
///   survive the save
/// - `batch_apply` is all-or-nothing
/// - Implementations must be `Send + Sync`; the scheduler calls them from its
///   own thread
pub trait Adapter: Send + Sync {
    /// Reads all records and the header row.
    fn load(&self, cancel: &CancelToken) -> AdapterResult<(Vec<Record>, Vec<String>)>;

    /// Replaces the table with `records` laid out by `strategy`.
    fn save(
        &self,
        cancel: &CancelToken,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) -> AdapterResult<()>;

    /// Applies operations as a read-modify-write on the current table.
    ///
    /// # Errors
    ///
    /// Fails the whole batch on an `Add` of an existing key or an
    /// `Update`/`Delete` of a missing key.
    fn batch_apply(&self, cancel: &CancelToken, operations: &[Operation]) -> AdapterResult<()>;
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn load(&self, cancel: &CancelToken) -> AdapterResult<(Vec<Record>, Vec<String>)> {
        (**self).load(cancel)
    }

    fn save(
        &self,
        cancel: &CancelToken,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) -> AdapterResult<()> {
        (**self).save(cancel, records, schema, strategy)
    }

    fn batch_apply(&self, cancel: &CancelToken, operations: &[Operation]) -> AdapterResult<()> {
        (**self).batch_apply(cancel, operations)
    }
}

/// A saved table as observed by [`MockAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTable {
    /// Records passed to `save`.
    pub records: Vec<Record>,
    /// Schema passed to `save`.
    pub schema: Vec<String>,
    /// Strategy passed to `save`.
    pub strategy: SyncStrategy,
}

/// A programmable adapter for testing.
///
/// Failures are queued per call type and consumed in order; once a queue is
/// empty the call succeeds. Every call is counted, including failed ones.
#[derive(Debug, Default)]
pub struct MockAdapter {
    initial: Mutex<(Vec<Record>, Vec<String>)>,
    load_failures: Mutex<VecDeque<AdapterError>>,
    save_failures: Mutex<VecDeque<AdapterError>>,
    saves: Mutex<Vec<SavedTable>>,
    batches: Mutex<Vec<Vec<Operation>>>,
    load_calls: AtomicU64,
    save_calls: AtomicU64,
}

impl MockAdapter {
    /// Creates a mock with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock whose `load` returns the given table.
    pub fn with_table(records: Vec<Record>, schema: Vec<String>) -> Self {
        let mock = Self::new();
        *mock.initial.lock() = (records, schema);
        mock
    }

    /// Makes the next `count` loads fail with `error`.
    pub fn fail_loads(&self, count: usize, error: AdapterError) {
        let mut queue = self.load_failures.lock();
        queue.extend(std::iter::repeat(error).take(count));
    }

    /// Makes the next `count` saves fail with `error`.
    pub fn fail_saves(&self, count: usize, error: AdapterError) {
        let mut queue = self.save_failures.lock();
        queue.extend(std::iter::repeat(error).take(count));
    }

    /// Number of `load` calls so far.
    pub fn load_calls(&self) -> u64 {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Number of `save` calls so far.
    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Successful saves, oldest first.
    pub fn saves(&self) -> Vec<SavedTable> {
        self.saves.lock().clone()
    }

    /// The most recent successful save.
    pub fn last_save(&self) -> Option<SavedTable> {
        self.saves.lock().last().cloned()
    }

    /// Batches received by `batch_apply`.
    pub fn batches(&self) -> Vec<Vec<Operation>> {
        self.batches.lock().clone()
    }
}

impl Adapter for MockAdapter {
    fn load(&self, cancel: &CancelToken) -> AdapterResult<(Vec<Record>, Vec<String>)> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        cancel.check()?;
        if let Some(error) = self.load_failures.lock().pop_front() {
            return Err(error);
        }
        Ok(self.initial.lock().clone())
    }

    fn save(
        &self,
        cancel: &CancelToken,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) -> AdapterResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        cancel.check()?;
        if let Some(error) = self.save_failures.lock().pop_front() {
            return Err(error);
        }
        self.saves.lock().push(SavedTable {
            records: records.to_vec(),
            schema: schema.to_vec(),
            strategy,
        });
        Ok(())
    }

    fn batch_apply(&self, cancel: &CancelToken, operations: &[Operation]) -> AdapterResult<()> {
        cancel.check()?;
        self.batches.lock().push(operations.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(AdapterError::Cancelled));
    }

    #[test]
    fn mock_failures_are_consumed_in_order() {
        let mock = MockAdapter::new();
        let cancel = CancelToken::new();
        mock.fail_saves(2, AdapterError::transient("busy"));

        assert!(mock.save(&cancel, &[], &[], SyncStrategy::RowPreserving).is_err());
        assert!(mock.save(&cancel, &[], &[], SyncStrategy::RowPreserving).is_err());
        assert!(mock.save(&cancel, &[], &[], SyncStrategy::Compacting).is_ok());

        assert_eq!(mock.save_calls(), 3);
        assert_eq!(mock.saves().len(), 1);
        assert_eq!(mock.last_save().unwrap().strategy, SyncStrategy::Compacting);
    }

    #[test]
    fn mock_load_returns_table() {
        let mock = MockAdapter::with_table(
            vec![Record::new(2).with_value("a", 1i64)],
            vec!["a".to_string()],
        );
        let (records, schema) = mock.load(&CancelToken::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(schema, vec!["a"]);
        assert_eq!(mock.load_calls(), 1);
    }

    #[test]
    fn mock_respects_cancellation() {
        let mock = MockAdapter::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(mock.load(&cancel), Err(AdapterError::Cancelled));
        assert_eq!(
            mock.batch_apply(&cancel, &[Operation::delete(2)]),
            Err(AdapterError::Cancelled)
        );
    }

    #[test]
    fn operation_constructors() {
        assert_eq!(Operation::delete(4).record.key, 4);
        assert_eq!(Operation::add(Record::new(3)).kind, OperationKind::Add);
        assert_eq!(Operation::update(Record::new(3)).kind, OperationKind::Update);
    }
}
