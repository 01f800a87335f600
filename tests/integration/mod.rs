//! Integration tests for app-utility
//!
//! End-to-end checks of the library pipeline and of the `app-utility`
//! binary, run with:
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **common**: `TestEnv`, an isolated app root, project root and config
//! - **render**: rendering batches through the library and the CLI
//! - **apps**: install, uninstall, apps, vars, check, defaults and manual

mod common;

mod apps;
mod render;
