//! Test utilities for the app utility
//!
//! Helpers shared by unit tests and the integration test target (enabled
//! there through the `test-utils` feature):
//! - [`init_test_logging`] wires `tracing` into the test harness output
//! - [`AppFixture`] lays out a throwaway app directory
//!
//! # Example
//!
//! ```rust,no_run
//! use biominer_app_util::test_utils::{AppFixture, init_test_logging};
//!
//! init_test_logging(None);
//! let fixture = AppFixture::builder()
//!     .inputs(r#"{"id": "{{ sample_id }}"}"#)
//!     .task("align.wdl", "task align {}")
//!     .build();
//! let app = fixture.app();
//! assert!(app.tasks_dir().join("align.wdl").exists());
//! ```

pub mod fixtures;

pub use fixtures::{AppFixture, AppFixtureBuilder};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, else `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=biominer_app_util=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
