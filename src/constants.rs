//! Global constants used throughout the app utility.
//!
//! File names of the app layout, exit codes, and parallelism parameters live
//! here so the CLI, the materializer, and the tests agree on them.

/// Version string reported by `app-utility version`.
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Inputs template inside an app, and rendered inputs inside a sample directory.
pub const INPUTS_FILE: &str = "inputs";

/// Workflow template inside an app, and rendered workflow inside a sample directory.
pub const WORKFLOW_FILE: &str = "workflow.wdl";

/// Task dependency directory of an app. Also the root entry of the archive.
pub const TASKS_DIR: &str = "tasks";

/// Optional JSON sidecar with per-app default variables.
pub const DEFAULTS_FILE: &str = "defaults";

/// Packaged task dependencies attached to every sample directory.
pub const ARCHIVE_FILE: &str = "tasks.zip";

/// App manual rendered by `app-utility manual`.
pub const README_FILE: &str = "README.md";

/// Record key that names the per-sample output directory.
pub const SAMPLE_ID_KEY: &str = "sample_id";

/// Record key injected with the run's project name.
pub const PROJECT_NAME_KEY: &str = "project_name";

/// Generic failure.
pub const EXIT_FAILURE: i32 = 1;

/// App is already installed and `--force` was not given.
pub const EXIT_APP_IS_INSTALLED: i32 = 1;

/// App installation failed.
pub const EXIT_APP_INSTALL_FAILED: i32 = 2;

/// A rendered inputs document is not valid JSON.
pub const EXIT_JSON_NOT_VALID: i32 = 3;

/// Default app store endpoint used by `install`.
pub const DEFAULT_ENDPOINT: &str = "http://choppy.3steps.cn";

/// Minimum number of samples rendered in parallel regardless of CPU count.
pub const MIN_PARALLELISM: usize = 1;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default number of samples rendered concurrently.
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism().map_or(FALLBACK_CORE_COUNT, usize::from);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}
