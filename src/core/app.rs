//! App handles and app-name parsing.
//!
//! An app is a directory holding an inputs template, a workflow template, and
//! a task dependency directory, plus an optional `defaults` sidecar:
//!
//! ```text
//! wes-latest/
//! ├── inputs          # JSON inputs template
//! ├── workflow.wdl    # WDL workflow template
//! ├── defaults        # optional JSON object of default variables
//! └── tasks/          # task files imported by the workflow
//! ```

use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::error::AppUtilError;
use crate::constants::{DEFAULTS_FILE, INPUTS_FILE, README_FILE, TASKS_DIR, WORKFLOW_FILE};

/// A validated app directory.
///
/// Construct with [`App::open`]; the layout is checked once and the handle is
/// treated as immutable for the rest of a render run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    root: PathBuf,
    name: String,
}

impl App {
    /// Open and validate an app directory.
    ///
    /// # Errors
    ///
    /// Returns [`AppUtilError::InvalidApp`] naming the first missing member.
    pub fn open(root: &Path) -> Result<Self> {
        let name = root
            .file_name()
            .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());

        if let Some(missing) = Self::missing_member(root) {
            return Err(AppUtilError::InvalidApp {
                name,
                missing: missing.to_string(),
            }
            .into());
        }

        Ok(Self {
            root: root.to_path_buf(),
            name,
        })
    }

    /// First required member absent from `root`, if any.
    #[must_use]
    pub fn missing_member(root: &Path) -> Option<&'static str> {
        if !root.is_dir() {
            return Some("app directory");
        }
        if !root.join(INPUTS_FILE).is_file() {
            return Some(INPUTS_FILE);
        }
        if !root.join(WORKFLOW_FILE).is_file() {
            return Some(WORKFLOW_FILE);
        }
        if !root.join(TASKS_DIR).is_dir() {
            return Some(TASKS_DIR);
        }
        None
    }

    /// Whether `root` has the layout of an app.
    #[must_use]
    pub fn is_valid(root: &Path) -> bool {
        Self::missing_member(root).is_none()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the app.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of a template file inside the app.
    #[must_use]
    pub fn template_path(&self, template_file: &str) -> PathBuf {
        self.root.join(template_file)
    }

    #[must_use]
    pub fn inputs_path(&self) -> PathBuf {
        self.root.join(INPUTS_FILE)
    }

    #[must_use]
    pub fn workflow_path(&self) -> PathBuf {
        self.root.join(WORKFLOW_FILE)
    }

    #[must_use]
    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR)
    }

    #[must_use]
    pub fn defaults_path(&self) -> PathBuf {
        self.root.join(DEFAULTS_FILE)
    }

    #[must_use]
    pub fn readme_path(&self) -> PathBuf {
        self.root.join(README_FILE)
    }
}

/// A store reference of the form `namespace/app[:version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppName {
    pub namespace: String,
    pub app_name: String,
    /// `latest` when no version was given.
    pub version: String,
}

impl AppName {
    /// Install directory relative to the app root: `namespace/app-version`.
    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        PathBuf::from(&self.namespace).join(format!("{}-{}", self.app_name, self.version))
    }

    /// Git branch or tag to clone; `latest` maps to `master`.
    #[must_use]
    pub fn git_ref(&self) -> &str {
        if self.version == "latest" {
            "master"
        } else {
            &self.version
        }
    }
}

fn app_name_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([-\w]+)/([-\w]+)(:[-.\w]+)?$").ok()).as_ref()
}

/// Parse `namespace/app[:version]`. Returns `None` for anything else, e.g. a
/// path to a zip archive.
#[must_use]
pub fn parse_app_name(input: &str) -> Option<AppName> {
    let caps = app_name_regex()?.captures(input)?;
    let version = caps
        .get(3)
        .map_or_else(|| "latest".to_string(), |m| m.as_str().trim_start_matches(':').to_string());

    Some(AppName {
        namespace: caps[1].to_string(),
        app_name: caps[2].to_string(),
        version,
    })
}
