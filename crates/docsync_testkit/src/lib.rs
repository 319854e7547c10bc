//! # DocSync Testkit
//!
//! Test utilities for docsync.
//!
//! This crate provides:
//! - Client fixtures backed by an in-memory mock server
//! - Property-based test generators using proptest
//! - Stress testing utilities
//! - Test log output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_client() {
//!     let client = TestClient::memory();
//!     let store = client.sync_store("books");
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use stress::*;
