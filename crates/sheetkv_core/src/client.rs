//! Client facade.

use crate::adapter::{Adapter, SyncStrategy};
use crate::cache::Cache;
use crate::config::Config;
use crate::error::{SheetKvError, SheetKvResult};
use crate::query::Query;
use crate::record::{Key, Record, MIN_KEY};
use crate::scheduler::Scheduler;
use crate::sync::{SaveOutcome, SyncCoordinator, SyncStats};
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct ClientState<A: Adapter + 'static> {
    closed: bool,
    scheduler: Option<Scheduler<A>>,
}

/// A typed key-value view of a spreadsheet-like table.
///
/// `Client` is the entry point for applications. It owns:
/// - the in-memory [`Cache`] that serves every read and write
/// - a [`SyncCoordinator`] that persists the cache through an [`Adapter`]
/// - an optional background [`Scheduler`] that saves pending changes
///
/// Keys are row numbers: row 1 holds the header, so data keys start at 2.
///
/// # Lifecycle
///
/// A client is open until [`Client::close`] runs. Closing stops the
/// scheduler and performs one final compacting save; afterwards every
/// operation fails with [`SheetKvError::ClientClosed`]. Dropping an open
/// client stops the scheduler but does not save.
///
/// # Example
///
/// ```rust
/// use sheetkv_core::{Client, Config, MemoryAdapter, Query, Record};
///
/// let client = Client::new(MemoryAdapter::new(), Config::new().manual_sync()).unwrap();
/// client.initialize().unwrap();
///
/// let key = client
///     .append(Record::default().with_value("name", "Alice").with_value("age", 30i64))
///     .unwrap();
/// assert_eq!(key, 2);
///
/// let adults = client.query(&Query::new().filter("age", ">=", 18i64)).unwrap();
/// assert_eq!(adults.len(), 1);
///
/// client.close().unwrap();
/// assert_eq!(client.adapter().row(2).unwrap(), vec!["30", "Alice"]);
/// ```
pub struct Client<A: Adapter + 'static> {
    config: Config,
    cache: Arc<Cache>,
    sync: Arc<SyncCoordinator<A>>,
    state: Mutex<ClientState<A>>,
}

impl<A: Adapter + 'static> Client<A> {
    /// Creates a client and starts periodic sync if the interval is positive.
    ///
    /// The cache starts empty; call [`Client::initialize`] to load the table.
    pub fn new(adapter: A, config: Config) -> SheetKvResult<Self> {
        let cache = Arc::new(Cache::new());
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&cache),
            adapter,
            config.retry.clone(),
        ));
        let scheduler = Scheduler::start(Arc::clone(&sync), config.sync_interval)?;

        Ok(Self {
            config,
            cache,
            sync,
            state: Mutex::new(ClientState {
                closed: false,
                scheduler,
            }),
        })
    }

    /// Replaces the cache with the adapter's table.
    ///
    /// Returns the number of records loaded.
    pub fn initialize(&self) -> SheetKvResult<usize> {
        self.ensure_open()?;
        self.sync.load_from_adapter()
    }

    /// Returns a copy of the record at `key`.
    pub fn get(&self, key: Key) -> SheetKvResult<Record> {
        self.with_open(|| self.cache.get(key))
    }

    /// Stores `record` at `key`, replacing any existing record.
    pub fn set(&self, key: Key, record: Record) -> SheetKvResult<()> {
        self.with_open(|| self.cache.set(key, record))
    }

    /// Stores `record` after the highest existing key and returns that key.
    ///
    /// The record's own key is ignored.
    pub fn append(&self, mut record: Record) -> SheetKvResult<Key> {
        self.with_open(|| {
            let key = self
                .cache
                .max_key()
                .map_or(MIN_KEY, |max| max.saturating_add(1));
            record.key = key;
            self.cache.append(record)?;
            Ok(key)
        })
    }

    /// Merges column updates into the record at `key`.
    ///
    /// A `None` value removes the column.
    pub fn update(&self, key: Key, updates: HashMap<String, Option<Value>>) -> SheetKvResult<()> {
        self.with_open(|| self.cache.update(key, updates))
    }

    /// Removes the record at `key`.
    pub fn delete(&self, key: Key) -> SheetKvResult<()> {
        self.with_open(|| self.cache.delete(key))
    }

    /// Returns the records matching `query`, ascending by key.
    pub fn query(&self, query: &Query) -> SheetKvResult<Vec<Record>> {
        self.with_open(|| self.cache.query(query))
    }

    /// Saves pending changes now, keeping row positions.
    pub fn sync(&self) -> SheetKvResult<SaveOutcome> {
        self.ensure_open()?;
        self.sync.save(SyncStrategy::RowPreserving)
    }

    /// Stops periodic sync and saves the table one last time, compacted.
    ///
    /// Closing an already closed client is a no-op.
    pub fn close(&self) -> SheetKvResult<()> {
        let scheduler = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.scheduler.take()
        };

        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
        }

        let outcome = self.sync.save_final(SyncStrategy::Compacting)?;
        info!(?outcome, "client closed");
        Ok(())
    }

    /// Returns true once [`Client::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Current column order.
    pub fn schema(&self) -> Vec<String> {
        self.cache.schema()
    }

    /// Number of records in the cache.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Keys changed since the last save, ascending.
    pub fn dirty_keys(&self) -> Vec<Key> {
        self.cache.dirty_keys()
    }

    /// Load and save statistics.
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backing adapter.
    pub fn adapter(&self) -> &A {
        self.sync.adapter()
    }

    fn ensure_open(&self) -> SheetKvResult<()> {
        if self.state.lock().closed {
            Err(SheetKvError::ClientClosed)
        } else {
            Ok(())
        }
    }

    /// Runs `op` while holding the client lock, so it cannot interleave with
    /// `close`.
    fn with_open<T>(&self, op: impl FnOnce() -> SheetKvResult<T>) -> SheetKvResult<T> {
        let state = self.state.lock();
        if state.closed {
            return Err(SheetKvError::ClientClosed);
        }
        op()
    }
}

impl<A: Adapter + 'static> std::fmt::Debug for Client<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("is_closed", &self.is_closed())
            .field("records", &self.len())
            .field("sync_interval", &self.config.sync_interval)
            .finish_non_exhaustive()
    }
}
