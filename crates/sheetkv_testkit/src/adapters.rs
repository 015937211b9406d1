//! Adapters for concurrency tests.

use parking_lot::{Condvar, Mutex};
use sheetkv_core::{
    Adapter, AdapterResult, CancelToken, MockAdapter, Operation, Record, SyncStrategy,
};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Latch {
    held: bool,
    in_flight: usize,
    started: u64,
}

/// Wraps an adapter and parks `save` calls while held.
///
/// Used to keep a save in flight while a test races a scheduler tick or a
/// cache mutation against it.
///
/// ```rust,ignore
/// let adapter = Arc::new(BlockingAdapter::new(MockAdapter::new()));
/// adapter.hold();
/// let saver = thread::spawn(move || coordinator.save(SyncStrategy::RowPreserving));
/// assert!(adapter.wait_for_saves(1, Duration::from_secs(5)));
/// // ... race against the in-flight save
/// adapter.release();
/// ```
#[derive(Debug)]
pub struct BlockingAdapter<A: Adapter = MockAdapter> {
    inner: A,
    latch: Mutex<Latch>,
    changed: Condvar,
}

impl<A: Adapter> BlockingAdapter<A> {
    /// Wraps `inner`. Saves pass straight through until [`Self::hold`].
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            latch: Mutex::new(Latch::default()),
            changed: Condvar::new(),
        }
    }

    /// The wrapped adapter.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Makes subsequent saves block until [`Self::release`].
    pub fn hold(&self) {
        self.latch.lock().held = true;
    }

    /// Lets parked and future saves proceed.
    pub fn release(&self) {
        self.latch.lock().held = false;
        self.changed.notify_all();
    }

    /// Number of saves currently parked or running.
    pub fn in_flight(&self) -> usize {
        self.latch.lock().in_flight
    }

    /// Number of save calls that have started.
    pub fn saves_started(&self) -> u64 {
        self.latch.lock().started
    }

    /// Waits until at least `count` saves have started.
    pub fn wait_for_saves(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut latch = self.latch.lock();
        while latch.started < count {
            if self.changed.wait_until(&mut latch, deadline).timed_out() {
                return latch.started >= count;
            }
        }
        true
    }
}

impl<A: Adapter> Adapter for BlockingAdapter<A> {
    fn load(&self, cancel: &CancelToken) -> AdapterResult<(Vec<Record>, Vec<String>)> {
        self.inner.load(cancel)
    }

    fn save(
        &self,
        cancel: &CancelToken,
        records: &[Record],
        schema: &[String],
        strategy: SyncStrategy,
    ) -> AdapterResult<()> {
        {
            let mut latch = self.latch.lock();
            latch.started += 1;
            latch.in_flight += 1;
            self.changed.notify_all();
            while latch.held {
                self.changed.wait(&mut latch);
            }
        }

        let result = self.inner.save(cancel, records, schema, strategy);
        self.latch.lock().in_flight -= 1;
        result
    }

    fn batch_apply(&self, cancel: &CancelToken, operations: &[Operation]) -> AdapterResult<()> {
        self.inner.batch_apply(cancel, operations)
    }
}
