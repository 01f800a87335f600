//! User-level configuration in `~/.biominer/config.toml`.
//!
//! ```toml
//! app_root_dir = "~/.biominer/apps"
//! project_root_dir = "/data/projects"
//! endpoint = "http://choppy.3steps.cn"
//! max_parallel = 8
//! ```
//!
//! Every key is optional. Values are layered, lowest precedence first:
//! built-in defaults, the config file, environment variables
//! (`BIOMINER_APP_DIR`, `BIOMINER_PROJECT_DIR`), then command-line flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{DEFAULT_ENDPOINT, default_max_parallel};
use crate::core::AppUtilError;
use crate::utils::platform::{get_home_dir, resolve_path};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "BIOMINER_CONFIG";
/// Overrides `app_root_dir`.
pub const APP_DIR_ENV: &str = "BIOMINER_APP_DIR";
/// Overrides `project_root_dir`.
pub const PROJECT_DIR_ENV: &str = "BIOMINER_PROJECT_DIR";

/// Contents of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Where apps are installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_root_dir: Option<String>,

    /// Where rendered projects are written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root_dir: Option<String>,

    /// App store base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Samples rendered concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

/// Effective settings after layering defaults, file, and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_root_dir: PathBuf,
    pub project_root_dir: PathBuf,
    pub endpoint: String,
    pub max_parallel: usize,
}

impl GlobalConfig {
    /// Load from [`Self::default_path`], or defaults when the file is absent.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` if given, else from the default location.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            AppUtilError::ConfigError {
                message: format!("{}: {e}", path.display()),
            }
            .into()
        })
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// `$BIOMINER_CONFIG`, else `~/.biominer/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(biominer_home()?.join("config.toml"))
    }

    /// Layer environment overrides and built-in defaults over the file values.
    pub fn resolve(&self) -> Result<Settings> {
        let app_root_dir = match env_value(APP_DIR_ENV).or_else(|| self.app_root_dir.clone()) {
            Some(dir) => resolve_path(&dir)?,
            None => biominer_home()?.join("apps"),
        };
        let project_root_dir = match env_value(PROJECT_DIR_ENV).or_else(|| self.project_root_dir.clone()) {
            Some(dir) => resolve_path(&dir)?,
            None => biominer_home()?.join("projects"),
        };

        Ok(Settings {
            app_root_dir,
            project_root_dir,
            endpoint: self.endpoint.clone().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            max_parallel: self.max_parallel.filter(|n| *n > 0).unwrap_or_else(default_max_parallel),
        })
    }

    /// A commented starting point for `config init`.
    #[must_use]
    pub fn init_example() -> String {
        format!(
            "# app-utility configuration\n\
             # app_root_dir = \"~/.biominer/apps\"\n\
             # project_root_dir = \"~/.biominer/projects\"\n\
             # endpoint = \"{DEFAULT_ENDPOINT}\"\n\
             # max_parallel = {}\n",
            default_max_parallel()
        )
    }
}

/// `~/.biominer`
fn biominer_home() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(".biominer"))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
