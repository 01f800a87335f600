//! Platform helpers: home directory lookup, path expansion, and executable probing.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Returns true when running on Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Home directory of the current user.
///
/// # Errors
///
/// Fails when the platform does not expose a home directory (`HOME` or
/// `USERPROFILE` unset).
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        let platform_help = if is_windows() {
            "On Windows: Check that the USERPROFILE environment variable is set"
        } else {
            "On Unix/Linux: Check that the HOME environment variable is set"
        };
        anyhow::anyhow!("Could not determine home directory.\n\n{platform_help}")
    })
}

/// Expand `~/` and `$VAR` references in a user-supplied path.
///
/// # Errors
///
/// Fails on references to undefined environment variables.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Common issues:\n\
            - Undefined environment variable (e.g., $UNDEFINED_VAR)\n\
            - Invalid variable syntax (use $VAR or ${{VAR}})"
        )
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Whether an executable named `cmd` is available on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}
