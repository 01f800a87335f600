//! File system utilities for directory copies and atomic writes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use biominer_app_util::utils::fs::{copy_dir, ensure_dir, safe_write};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! ensure_dir(Path::new("projects/demo/S1"))?;
//! safe_write(Path::new("projects/demo/S1/inputs"), "{}")?;
//! copy_dir(Path::new("apps/wes/tasks"), Path::new("projects/demo/S1/tasks"))?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;

// Directory operations
pub use dirs::{
    copy_dir, ensure_dir, ensure_parent_dir, is_path_component, remove_dir_all, replace_dir, walk_files,
};

// Atomic write operations
pub use atomic::{atomic_write, safe_write};
