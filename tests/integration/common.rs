//! Shared helpers for the integration tests.

use assert_cmd::Command;
use biominer_app_util::test_utils::{AppFixtureBuilder, init_test_logging};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated app root, project root and config file for one test.
pub struct TestEnv {
    temp: TempDir,
    app_root: PathBuf,
    project_root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        init_test_logging(None);
        let temp = TempDir::new().unwrap();
        let app_root = temp.path().join("apps");
        let project_root = temp.path().join("projects");
        fs::create_dir_all(&app_root).unwrap();
        fs::create_dir_all(&project_root).unwrap();
        Self {
            temp,
            app_root,
            project_root,
        }
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Install `app` under the app root as `name`.
    pub fn add_app(&self, name: &str, app: AppFixtureBuilder) -> PathBuf {
        let root = self.app_root.join(name);
        app.write_to(&root);
        root
    }

    /// Write a file in the scratch area, returning its path.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// `app-utility` with this environment's directories and no user config.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("app-utility").unwrap();
        cmd.current_dir(self.temp.path())
            .env("BIOMINER_CONFIG", self.temp.path().join("config.toml"))
            .env("BIOMINER_APP_DIR", &self.app_root)
            .env("BIOMINER_PROJECT_DIR", &self.project_root)
            .env("BIOMINER_NO_PROGRESS", "1")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }
}
