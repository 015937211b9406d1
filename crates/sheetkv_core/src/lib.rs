//! # SheetKV Core
//!
//! A typed key-value store over a spreadsheet-like table.
//!
//! This crate provides:
//! - Dynamic cell values and records with lenient typed accessors
//! - A query engine (filter conditions, pagination)
//! - An in-memory cache with dirty tracking
//! - An adapter abstraction over the backing store, with an in-memory grid
//!   adapter and a programmable mock
//! - A sync coordinator with retry and exponential backoff
//! - A periodic background scheduler
//! - A client facade tying it together
//!
//! ## Architecture
//!
//! The cache is authoritative while a client is open. Writes mark keys
//! dirty; a save snapshots the whole table and hands it to the adapter as
//! one full rewrite:
//! 1. Application writes go to the cache
//! 2. The scheduler or an explicit `sync` saves with row positions kept
//! 3. `close` saves once more, compacting the rows
//!
//! ## Key Invariants
//!
//! - A record's key is its row number; row 1 is the header
//! - A save only marks clean what it actually persisted
//! - At most one save runs at a time; scheduled ticks never queue
//! - Deleted records are removed by absence from the next save

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod cache;
mod client;
mod config;
mod error;
mod grid;
mod query;
mod record;
mod scheduler;
mod sync;
mod value;

pub use adapter::{
    Adapter, CancelToken, MockAdapter, Operation, OperationKind, SavedTable, SyncStrategy,
};
pub use cache::{merge_schemas, Cache, CacheSnapshot};
pub use client::Client;
pub use config::{Config, RetryConfig};
pub use error::{AdapterError, AdapterResult, SheetKvError, SheetKvResult};
pub use grid::{is_blank, parse_rows, render_rows, MemoryAdapter, Row};
pub use query::{apply_query, matches_query, validate_query, Condition, Operand, Operator, Query};
pub use record::{Key, Record, MIN_KEY};
pub use scheduler::{sync_tick, Scheduler, TickOutcome};
pub use sync::{SaveOutcome, SyncCoordinator, SyncPermit, SyncStats};
pub use value::{parse_timestamp, Timestamp, Value};
