//! App directory fixtures.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::constants::{DEFAULTS_FILE, INPUTS_FILE, README_FILE, TASKS_DIR, WORKFLOW_FILE};
use crate::core::App;

const DEFAULT_INPUTS: &str = r#"{"sample_id": "{{ sample_id }}"}"#;
const DEFAULT_WORKFLOW: &str = "workflow demo {}\n";

/// Builder for an app directory; every member has a working default.
#[derive(Debug, Clone)]
pub struct AppFixtureBuilder {
    name: String,
    inputs: Option<String>,
    workflow: Option<String>,
    defaults: Option<Value>,
    tasks: Vec<(String, String)>,
    readme: Option<String>,
}

impl Default for AppFixtureBuilder {
    fn default() -> Self {
        Self {
            name: "demo-latest".to_string(),
            inputs: Some(DEFAULT_INPUTS.to_string()),
            workflow: Some(DEFAULT_WORKFLOW.to_string()),
            defaults: None,
            tasks: Vec::new(),
            readme: None,
        }
    }
}

impl AppFixtureBuilder {
    /// Directory name of the app.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn inputs(mut self, template: impl Into<String>) -> Self {
        self.inputs = Some(template.into());
        self
    }

    #[must_use]
    pub fn workflow(mut self, template: impl Into<String>) -> Self {
        self.workflow = Some(template.into());
        self
    }

    /// Leave out the inputs template, producing an invalid app.
    #[must_use]
    pub fn without_inputs(mut self) -> Self {
        self.inputs = None;
        self
    }

    #[must_use]
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Add a file under `tasks/`.
    #[must_use]
    pub fn task(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.tasks.push((path.into(), content.into()));
        self
    }

    #[must_use]
    pub fn readme(mut self, content: impl Into<String>) -> Self {
        self.readme = Some(content.into());
        self
    }

    /// Write the app layout into `root`, creating it.
    ///
    /// # Panics
    ///
    /// Panics on any filesystem error.
    pub fn write_to(&self, root: &Path) {
        fs::create_dir_all(root.join(TASKS_DIR)).expect("create tasks dir");

        if let Some(inputs) = &self.inputs {
            fs::write(root.join(INPUTS_FILE), inputs).expect("write inputs");
        }
        if let Some(workflow) = &self.workflow {
            fs::write(root.join(WORKFLOW_FILE), workflow).expect("write workflow");
        }
        if let Some(defaults) = &self.defaults {
            let content = serde_json::to_string_pretty(defaults).expect("serialize defaults");
            fs::write(root.join(DEFAULTS_FILE), content).expect("write defaults");
        }
        if let Some(readme) = &self.readme {
            fs::write(root.join(README_FILE), readme).expect("write readme");
        }
        for (path, content) in &self.tasks {
            let target = root.join(TASKS_DIR).join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).expect("create task parent");
            }
            fs::write(target, content).expect("write task");
        }
    }

    /// Write the app into a fresh temporary directory.
    #[must_use]
    pub fn build(self) -> AppFixture {
        let temp = TempDir::new().expect("create temp dir");
        let root = temp.path().join(&self.name);
        self.write_to(&root);
        AppFixture {
            temp,
            root,
        }
    }
}

/// An app directory living in a temporary directory.
#[derive(Debug)]
pub struct AppFixture {
    temp: TempDir,
    root: PathBuf,
}

impl AppFixture {
    #[must_use]
    pub fn builder() -> AppFixtureBuilder {
        AppFixtureBuilder::default()
    }

    /// The app directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The temporary directory holding the app, free for other test files.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        self.temp.path()
    }

    /// Open the fixture as an [`App`].
    ///
    /// # Panics
    ///
    /// Panics if the layout is invalid.
    #[must_use]
    pub fn app(&self) -> App {
        App::open(&self.root).expect("fixture app is valid")
    }

    /// Write a file next to the app, returning its path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, content).expect("write fixture file");
        path
    }
}
