//! Cross-platform utilities shared by the rest of the crate.
//!
//! - [`fs`] - directory creation, recursive copies, and atomic writes
//! - [`platform`] - home directory lookup, path expansion, and executable probing
//! - [`progress`] - progress bars that respect `--no-progress`

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{atomic_write, copy_dir, ensure_dir, replace_dir, safe_write};
pub use platform::{command_exists, get_home_dir, resolve_path};
pub use progress::ProgressBar;
