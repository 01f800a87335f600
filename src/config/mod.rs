//! Configuration for app-utility.
//!
//! A single optional TOML file (`~/.biominer/config.toml`, or the path in
//! `BIOMINER_CONFIG`) supplies the app root, project root, store endpoint and
//! parallelism. See [`global`] for the layering rules.

pub mod global;

pub use global::{APP_DIR_ENV, CONFIG_PATH_ENV, GlobalConfig, PROJECT_DIR_ENV, Settings};
