//! Shared helpers for SheetKV benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
