//! Background periodic sync.

use crate::adapter::{Adapter, SyncStrategy};
use crate::error::SheetKvResult;
use crate::sync::{SaveOutcome, SyncCoordinator};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another save held the sync gate; nothing was done.
    Skipped,
    /// Nothing was pending.
    Clean,
    /// Pending changes were saved.
    Saved,
    /// The save failed; the error was logged and dropped.
    Failed,
}

/// Runs one periodic sync attempt.
///
/// Never blocks on an in-flight save: if the sync gate is held the tick is
/// skipped rather than queued.
pub fn sync_tick<A: Adapter>(coordinator: &SyncCoordinator<A>) -> TickOutcome {
    let Some(permit) = coordinator.try_begin_save() else {
        debug!("sync in flight, skipping tick");
        return TickOutcome::Skipped;
    };

    if !coordinator.cache().has_pending_changes() {
        return TickOutcome::Clean;
    }

    match coordinator.save_with_permit(&permit, SyncStrategy::RowPreserving, false) {
        Ok(SaveOutcome::Saved { .. }) => TickOutcome::Saved,
        Ok(SaveOutcome::Skipped) => TickOutcome::Clean,
        Err(e) => {
            warn!(error = %e, "periodic sync failed");
            TickOutcome::Failed
        }
    }
}

/// Owns the background sync thread.
///
/// The thread wakes every `interval` and runs [`sync_tick`]. [`Scheduler::stop`]
/// (also run on drop) signals the thread, joins it and then waits for the
/// sync gate, so no save is in flight once it returns.
pub struct Scheduler<A: Adapter + 'static> {
    coordinator: Arc<SyncCoordinator<A>>,
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl<A: Adapter + 'static> Scheduler<A> {
    /// Starts the background thread.
    ///
    /// Returns `Ok(None)` when `interval` is zero: sync is then purely
    /// explicit.
    pub fn start(
        coordinator: Arc<SyncCoordinator<A>>,
        interval: Duration,
    ) -> SheetKvResult<Option<Self>> {
        if interval.is_zero() {
            return Ok(None);
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let ticks = Arc::new(AtomicU64::new(0));

        let thread_coordinator = Arc::clone(&coordinator);
        let thread_ticks = Arc::clone(&ticks);
        let handle = thread::Builder::new()
            .name("sheetkv-sync".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        thread_ticks.fetch_add(1, Ordering::SeqCst);
                        sync_tick(&thread_coordinator);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        info!(?interval, "periodic sync started");
        Ok(Some(Self {
            coordinator,
            interval,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            ticks,
        }))
    }

    /// Tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Returns true until [`Scheduler::stop`] has run.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the thread and waits for any in-flight save. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // the thread may already be gone; a dropped sender stops it too
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("periodic sync thread panicked");
            }
            self.coordinator.wait_idle();
            info!("periodic sync stopped");
        }
    }
}

impl<A: Adapter + 'static> Drop for Scheduler<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
