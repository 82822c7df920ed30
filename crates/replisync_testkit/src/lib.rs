//! # Replisync Testkit
//!
//! Test utilities for replisync.
//!
//! This crate provides:
//! - Reference schemas with cyclic foreign keys
//! - Stores stamped by a manual clock
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replisync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     init_tracing();
//!     let store = TestStore::projects_tasks();
//!     // ... sync operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber for the current test binary.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`. Calling this
/// more than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
