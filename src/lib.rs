//! biominer app-utility
//!
//! Renders bioinformatics app templates into per-sample workflow projects.
//!
//! An *app* is a directory holding an `inputs` template (JSON after
//! rendering), a `workflow.wdl` template, a `tasks/` directory of WDL
//! dependencies, and optionally a `defaults` JSON object and a `README.md`.
//! Given a samples file (JSON or CSV, one record per sample with a
//! `sample_id`), the renderer produces:
//!
//! ```text
//! <work_dir>/<project_name>/<sample_id>/
//!     inputs          # rendered and checked to be valid JSON
//!     workflow.wdl    # rendered
//!     defaults        # copied when the app has one
//!     tasks/          # copied
//!     tasks.zip       # tasks/ archived for the workflow engine
//! ```
//!
//! # Modules
//!
//! ## Pipeline
//! - [`defaults`] - per-app default variables
//! - [`templating`] - variable extraction and Tera rendering
//! - [`samples`] - samples file parsing (JSON or CSV)
//! - [`resolver`] - merging defaults, samples and the project name; pre-flight checks
//! - [`validation`] - JSON checks with line/column diagnostics
//! - [`archive`] - reproducible zip archives of `tasks/`
//! - [`materialize`] - the per-sample state machine and concurrent batches
//!
//! ## App management
//! - [`registry`] - list, install, uninstall and read manuals of apps
//! - [`git`] - git subprocesses for installing from the app store
//!
//! ## Supporting modules
//! - [`core`] - the app model and error types
//! - [`config`] - `~/.biominer/config.toml`
//! - [`cli`] - the `app-utility` command line
//! - [`utils`] - filesystem, platform and progress helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use biominer_app_util::materialize::{RenderOptions, render_app};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = RenderOptions::new("cohort1", "/data/projects").max_parallel(4);
//! let report = render_app(Path::new("apps/wes-latest"), Path::new("samples.csv"), options).await?;
//! println!("{} sample(s) rendered", report.succeeded().count());
//! report.into_result()?;
//! # Ok(())
//! # }
//! ```

// Pipeline
pub mod archive;
pub mod defaults;
pub mod materialize;
pub mod resolver;
pub mod samples;
pub mod templating;
pub mod validation;

// App management
pub mod git;
pub mod registry;

// Supporting modules
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
