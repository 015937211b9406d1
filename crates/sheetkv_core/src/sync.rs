//! Load/save orchestration between the cache and an adapter.

use crate::adapter::{Adapter, CancelToken, SyncStrategy};
use crate::cache::Cache;
use crate::config::RetryConfig;
use crate::error::{AdapterError, AdapterResult, SheetKvError, SheetKvResult};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics about load and save operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Successful loads.
    pub loads_completed: u64,
    /// Successful saves.
    pub saves_completed: u64,
    /// Saves skipped because nothing was pending.
    pub saves_skipped: u64,
    /// Adapter calls retried after a failure.
    pub retries: u64,
    /// Loads or saves that gave up.
    pub failures: u64,
    /// Time of the last successful save.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Outcome of a save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was pending; the adapter was not called.
    Skipped,
    /// The adapter accepted the table.
    Saved {
        /// Number of records written.
        records: usize,
    },
}

/// Moves data between a [`Cache`] and an [`Adapter`].
///
/// Adapter calls are retried with exponential backoff. Saves are serialized
/// by a sync gate: [`SyncCoordinator::save`] waits for it, while
/// [`SyncCoordinator::try_begin_save`] lets the scheduler skip a tick instead
/// of queueing behind an in-flight save.
pub struct SyncCoordinator<A: Adapter> {
    cache: Arc<Cache>,
    adapter: A,
    retry: RetryConfig,
    cancel: CancelToken,
    gate: Mutex<()>,
    stats: RwLock<SyncStats>,
}

/// Proof that the caller holds the sync gate.
pub struct SyncPermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl<A: Adapter> SyncCoordinator<A> {
    /// Creates a coordinator.
    pub fn new(cache: Arc<Cache>, adapter: A, retry: RetryConfig) -> Self {
        Self {
            cache,
            adapter,
            retry,
            cancel: CancelToken::new(),
            gate: Mutex::new(()),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// The cache this coordinator persists.
    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// The adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Token passed to every adapter call. Cancelling it aborts retries.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Waits for the sync gate.
    pub fn begin_save(&self) -> SyncPermit<'_> {
        SyncPermit {
            _guard: self.gate.lock(),
        }
    }

    /// Takes the sync gate if no save is in flight.
    pub fn try_begin_save(&self) -> Option<SyncPermit<'_>> {
        self.gate.try_lock().map(|guard| SyncPermit { _guard: guard })
    }

    /// Blocks until any in-flight save has finished.
    pub fn wait_idle(&self) {
        drop(self.gate.lock());
    }

    /// Replaces the cache contents with the adapter's table.
    pub fn load_from_adapter(&self) -> SheetKvResult<usize> {
        let (records, schema) = self.with_retry("load", |cancel| self.adapter.load(cancel))?;
        let count = records.len();
        self.cache.load(records, schema);
        self.stats.write().loads_completed += 1;
        info!(records = count, "loaded table from adapter");
        Ok(count)
    }

    /// Saves pending changes, waiting for any in-flight save first.
    pub fn save(&self, strategy: SyncStrategy) -> SheetKvResult<SaveOutcome> {
        let permit = self.begin_save();
        self.save_with_permit(&permit, strategy, false)
    }

    /// Saves the table even if nothing is pending, as long as the key space
    /// has gaps that `strategy` would remove.
    pub fn save_final(&self, strategy: SyncStrategy) -> SheetKvResult<SaveOutcome> {
        let permit = self.begin_save();
        let force = strategy == SyncStrategy::Compacting && self.cache.has_gaps();
        self.save_with_permit(&permit, strategy, force)
    }

    /// Saves pending changes while holding the sync gate.
    ///
    /// Only the changes captured in the snapshot are marked clean; writes
    /// that land during the adapter call stay pending.
    pub fn save_with_permit(
        &self,
        _permit: &SyncPermit<'_>,
        strategy: SyncStrategy,
        force: bool,
    ) -> SheetKvResult<SaveOutcome> {
        if !force && !self.cache.has_pending_changes() {
            debug!("no pending changes, skipping save");
            self.stats.write().saves_skipped += 1;
            return Ok(SaveOutcome::Skipped);
        }

        let snapshot = self.cache.snapshot();
        self.with_retry("save", |cancel| {
            self.adapter
                .save(cancel, &snapshot.records, &snapshot.schema, strategy)
        })?;

        self.cache.mark_clean(snapshot.seq);
        {
            let mut stats = self.stats.write();
            stats.saves_completed += 1;
            stats.last_sync_time = Some(Instant::now());
            stats.last_error = None;
        }
        info!(
            records = snapshot.records.len(),
            ?strategy,
            "saved table to adapter"
        );
        Ok(SaveOutcome::Saved {
            records: snapshot.records.len(),
        })
    }

    fn with_retry<T>(
        &self,
        operation: &str,
        mut call: impl FnMut(&CancelToken) -> AdapterResult<T>,
    ) -> SheetKvResult<T> {
        let attempts = self.retry.total_attempts();
        let mut made = 0u32;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                self.backoff(attempt - 1);
                self.stats.write().retries += 1;
            }
            if self.cancel.is_cancelled() {
                return Err(self.fail(operation, SheetKvError::Cancelled));
            }

            made += 1;
            match call(&self.cancel) {
                Ok(value) => return Ok(value),
                Err(AdapterError::Cancelled) => {
                    return Err(self.fail(operation, SheetKvError::Cancelled));
                }
                Err(e) => {
                    warn!(operation, attempt, error = %e, "adapter call failed");
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let source = last_error.unwrap_or_else(|| AdapterError::fatal("no attempts made"));
        Err(self.fail(
            operation,
            SheetKvError::SyncFailed {
                retries: made.saturating_sub(1),
                source,
            },
        ))
    }

    fn backoff(&self, failed_attempt: u32) {
        let delay = self.retry.delay_after_attempt(failed_attempt);
        if delay > Duration::ZERO {
            std::thread::sleep(delay);
        }
    }

    fn fail(&self, operation: &str, error: SheetKvError) -> SheetKvError {
        let mut stats = self.stats.write();
        stats.failures += 1;
        stats.last_error = Some(format!("{operation}: {error}"));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;
    use crate::record::Record;

    fn coordinator(mock: Arc<MockAdapter>, retries: u32) -> SyncCoordinator<Arc<MockAdapter>> {
        let retry = RetryConfig::new(retries)
            .with_retry_interval(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(2));
        SyncCoordinator::new(Arc::new(Cache::new()), mock, retry)
    }

    fn dirty(sync: &SyncCoordinator<Arc<MockAdapter>>) {
        sync.cache()
            .set(2, Record::default().with_value("name", "Alice"))
            .unwrap();
    }

    #[test]
    fn save_skips_when_clean() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 3);

        assert_eq!(sync.save(SyncStrategy::RowPreserving).unwrap(), SaveOutcome::Skipped);
        assert_eq!(mock.save_calls(), 0);
        assert_eq!(sync.stats().saves_skipped, 1);
    }

    #[test]
    fn save_clears_dirty_on_success() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 3);
        dirty(&sync);

        let outcome = sync.save(SyncStrategy::RowPreserving).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { records: 1 });
        assert!(sync.cache().dirty_keys().is_empty());

        let saved = mock.last_save().unwrap();
        assert_eq!(saved.schema, vec!["name"]);
        assert_eq!(saved.strategy, SyncStrategy::RowPreserving);
        assert_eq!(sync.stats().saves_completed, 1);
    }

    #[test]
    fn transient_failures_are_retried() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 3);
        dirty(&sync);
        mock.fail_saves(2, AdapterError::transient("rate limited"));

        sync.save(SyncStrategy::RowPreserving).unwrap();
        assert_eq!(mock.save_calls(), 3);
        assert_eq!(sync.stats().retries, 2);
        assert!(sync.cache().dirty_keys().is_empty());
    }

    #[test]
    fn exhausted_retries_keep_dirty_state() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 2);
        dirty(&sync);
        mock.fail_saves(3, AdapterError::transient("unavailable"));

        let err = sync.save(SyncStrategy::RowPreserving).unwrap_err();
        match err {
            SheetKvError::SyncFailed { retries, source } => {
                assert_eq!(retries, 2);
                assert_eq!(source, AdapterError::transient("unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.save_calls(), 3);
        assert_eq!(sync.cache().dirty_keys(), vec![2]);
        assert_eq!(sync.stats().failures, 1);
        assert!(sync.stats().last_error.is_some());

        sync.save(SyncStrategy::RowPreserving).unwrap();
        assert!(sync.cache().dirty_keys().is_empty());
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 5);
        dirty(&sync);
        mock.fail_saves(1, AdapterError::fatal("permission denied"));

        assert!(sync.save(SyncStrategy::RowPreserving).unwrap_err().is_sync_failure());
        assert_eq!(mock.save_calls(), 1);
    }

    #[test]
    fn load_retries_then_replaces_cache() {
        let mock = Arc::new(MockAdapter::with_table(
            vec![Record::new(2).with_value("a", 1i64), Record::new(4).with_value("a", 2i64)],
            vec!["a".to_string()],
        ));
        let sync = coordinator(Arc::clone(&mock), 3);
        dirty(&sync);
        mock.fail_loads(1, AdapterError::transient("timeout"));

        assert_eq!(sync.load_from_adapter().unwrap(), 2);
        assert_eq!(mock.load_calls(), 2);
        assert_eq!(sync.cache().len(), 2);
        assert!(!sync.cache().has_pending_changes());
        assert_eq!(sync.stats().loads_completed, 1);
    }

    #[test]
    fn load_failure_leaves_cache_alone() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 1);
        dirty(&sync);
        mock.fail_loads(2, AdapterError::transient("timeout"));

        let err = sync.load_from_adapter().unwrap_err();
        assert!(matches!(err, SheetKvError::SyncFailed { retries: 1, .. }));
        assert_eq!(mock.load_calls(), 2);
        assert_eq!(sync.cache().dirty_keys(), vec![2]);
    }

    #[test]
    fn cancellation_stops_retries() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 3);
        dirty(&sync);
        sync.cancel_token().cancel();

        assert!(matches!(
            sync.save(SyncStrategy::RowPreserving),
            Err(SheetKvError::Cancelled)
        ));
        assert_eq!(mock.save_calls(), 0);
        assert_eq!(sync.cache().dirty_keys(), vec![2]);
    }

    #[test]
    fn final_save_compacts_clean_gaps() {
        let mock = Arc::new(MockAdapter::new());
        let sync = coordinator(Arc::clone(&mock), 0);
        sync.cache().load(
            vec![Record::new(2).with_value("a", 1i64), Record::new(5).with_value("a", 2i64)],
            vec!["a".to_string()],
        );

        assert_eq!(
            sync.save_final(SyncStrategy::Compacting).unwrap(),
            SaveOutcome::Saved { records: 2 }
        );
        assert_eq!(mock.last_save().unwrap().strategy, SyncStrategy::Compacting);

        sync.cache().load(vec![Record::new(2)], vec![]);
        assert_eq!(
            sync.save_final(SyncStrategy::Compacting).unwrap(),
            SaveOutcome::Skipped
        );
    }

    #[test]
    fn try_begin_save_fails_while_held() {
        let sync = coordinator(Arc::new(MockAdapter::new()), 0);
        let permit = sync.begin_save();
        assert!(sync.try_begin_save().is_none());
        drop(permit);
        assert!(sync.try_begin_save().is_some());
    }
}
