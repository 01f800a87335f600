//! Core types and error handling for the app utility.
//!
//! This module holds the pieces every other module depends on:
//! - [`error`] - the [`AppUtilError`] taxonomy and [`ErrorContext`] reporting
//! - [`app`] - the validated [`App`] handle and app-name parsing
//!
//! # Examples
//!
//! ```rust,no_run
//! use biominer_app_util::core::App;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let app = App::open(Path::new("/home/me/.biominer/apps/choppy/wes-latest"))?;
//! println!("inputs template: {}", app.inputs_path().display());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod error;

pub use app::{App, AppName, parse_app_name};
pub use error::{AppUtilError, ErrorContext, exit_code_for, user_friendly_error};
