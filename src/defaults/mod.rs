//! Per-app default variables.
//!
//! Every app may carry a `defaults` sidecar: a flat JSON object mapping
//! template variable names to values. During a render, a sample that omits a
//! variable takes the app's default; a sample that sets it keeps its own value
//! (see [`crate::resolver::resolve`]).
//!
//! [`DefaultVariables`] is an explicit value: it is loaded once per app per run,
//! shared read-only with everything that renders, and written back only when
//! [`DefaultVariables::save`] is called.
//!
//! # Examples
//!
//! ```rust,no_run
//! use biominer_app_util::defaults::DefaultVariables;
//! use serde_json::json;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut defaults = DefaultVariables::load(Path::new("apps/choppy/wes-latest"))?;
//! defaults.set("reference", json!("/data/hg38.fa"));
//! defaults.save()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::constants::DEFAULTS_FILE;
use crate::core::AppUtilError;
use crate::utils::fs::atomic_write;

/// Default variable values of one app, backed by its `defaults` sidecar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefaultVariables {
    path: PathBuf,
    vars: BTreeMap<String, Value>,
}

impl DefaultVariables {
    /// Load the sidecar of the app at `app_path`.
    ///
    /// A missing sidecar yields an empty store.
    ///
    /// # Errors
    ///
    /// Fails if the sidecar exists but cannot be read or is not a JSON object.
    pub fn load(app_path: &Path) -> Result<Self> {
        let path = app_path.join(DEFAULTS_FILE);
        if !path.is_file() {
            tracing::debug!("No defaults file at {}", path.display());
            return Ok(Self {
                path,
                vars: BTreeMap::new(),
            });
        }

        let content = std::fs::read_to_string(&path)
            .map_err(AppUtilError::Io)
            .with_context(|| format!("Failed to read defaults file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(AppUtilError::Json)
            .with_context(|| format!("Failed to parse defaults file: {}", path.display()))?;

        let Value::Object(map) = value else {
            return Err(AppUtilError::ConfigError {
                message: format!("{} must contain a JSON object", path.display()),
            }
            .into());
        };

        tracing::debug!("Loaded {} default variable(s) from {}", map.len(), path.display());
        Ok(Self {
            path,
            vars: map.into_iter().collect(),
        })
    }

    /// Sidecar path this store saves to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Whether `key` is defined, whatever its value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// All stored variables, sorted by key.
    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    /// Names in `required` that have no default.
    pub fn diff<I, S>(&self, required: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        required
            .into_iter()
            .filter(|key| !self.has(key.as_ref()))
            .map(|key| key.as_ref().to_string())
            .collect()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    /// Merge `entries` into the store; later keys overwrite earlier ones.
    pub fn set_many<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.vars.extend(entries);
    }

    /// The stored entries whose keys appear in `keys`, or every entry when
    /// `keys` is empty.
    #[must_use]
    pub fn show_subset(&self, keys: &[String]) -> BTreeMap<String, Value> {
        if keys.is_empty() {
            return self.vars.clone();
        }

        keys.iter()
            .filter_map(|key| self.vars.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    /// Write the store back to the sidecar, keys sorted, two-space indented.
    ///
    /// # Errors
    ///
    /// Fails if the app directory is not writable.
    pub fn save(&self) -> Result<()> {
        let mut content = serde_json::to_string_pretty(&self.vars)
            .context("Failed to serialize default variables")?;
        content.push('\n');

        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to save defaults file: {}", self.path.display()))?;

        tracing::debug!("Saved {} default variable(s) to {}", self.vars.len(), self.path.display());
        Ok(())
    }
}

/// Parse `key:value` pairs into a variable map.
///
/// The value is everything after the first colon. Values that parse as JSON
/// keep their JSON type (`threads:8` is a number); anything else is a string.
///
/// # Errors
///
/// Fails on an item without a colon or with an empty key.
pub fn parse_kv_list(items: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut vars = BTreeMap::new();

    for item in items {
        let Some((key, raw)) = item.split_once(':') else {
            bail!("Invalid key:value pair '{item}'");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty key in key:value pair '{item}'");
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        vars.insert(key.to_string(), value);
    }

    Ok(vars)
}
