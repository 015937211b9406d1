//! # SheetKV Testkit
//!
//! Test utilities for SheetKV.
//!
//! This crate provides:
//! - Fixtures: a sample people table and preconfigured clients
//! - Property-based test generators using proptest
//! - A blocking adapter for exercising save races
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetkv_testkit::prelude::*;
//!
//! #[test]
//! fn query_people() {
//!     let (client, _sheet) = memory_client(&people());
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod adapters;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use adapters::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
