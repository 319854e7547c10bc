//! Benchmarks for docsync.
//!
//! Run with `cargo bench -p docsync_bench`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
