//! Packaging an app's task directory into `tasks.zip`.
//!
//! The workflow engine consuming the archive only reads the original ZIP
//! variant ("version needed to extract" 1.0): stored entries, no ZIP64, no
//! directory records. Two strategies produce it:
//!
//! - [`ExternalZip`] runs the host's `zip` executable
//! - [`BuiltinZip`] writes the archive with the `zip` crate, restricted to
//!   the features of that variant
//!
//! [`Archiver::detect`] probes the host once and picks a strategy. Each
//! [`Archiver::build_archive`] call copies the source directory into a fresh
//! private workspace and archives it there, so concurrent callers never share
//! files and the process working directory is never changed.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::constants::{ARCHIVE_FILE, TASKS_DIR};
use crate::core::AppUtilError;
use crate::utils::fs::{copy_dir, walk_files};
use crate::utils::platform::command_exists;

/// Name of the external archiver probed on `PATH`.
const ZIP_COMMAND: &str = "zip";

/// A way of turning `workspace/tasks` into `workspace/tasks.zip`.
pub trait ArchiveStrategy: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Archive the directory `workspace/<root>` into `output`, with every
    /// entry prefixed by `<root>/`.
    fn build(&self, workspace: &Path, root: &str, output: &Path) -> Result<()>;
}

/// Archives with the host `zip` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalZip;

impl ArchiveStrategy for ExternalZip {
    fn name(&self) -> &'static str {
        "external zip"
    }

    fn build(&self, workspace: &Path, root: &str, output: &Path) -> Result<()> {
        // -0 stores without compression, -D omits directory entries, -X drops
        // extra attributes
        let result = Command::new(ZIP_COMMAND)
            .args(["-r", "-q", "-X", "-0", "-D"])
            .arg(output)
            .arg(root)
            .current_dir(workspace)
            .output()
            .map_err(|e| archive_error(format!("failed to run {ZIP_COMMAND}: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(archive_error(format!(
                "{ZIP_COMMAND} exited with {}: {}",
                result.status,
                stderr.trim()
            ))
            .into());
        }

        Ok(())
    }
}

/// Archives in-process with the `zip` crate.
///
/// Only file entries are written, uncompressed, with a fixed timestamp and
/// in sorted order. Directories are implied by the entry paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinZip;

impl BuiltinZip {
    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644)
            .large_file(false)
    }
}

impl ArchiveStrategy for BuiltinZip {
    fn name(&self) -> &'static str {
        "builtin zip"
    }

    fn build(&self, workspace: &Path, root: &str, output: &Path) -> Result<()> {
        let source = workspace.join(root);
        let file = File::create(output)
            .with_context(|| format!("Failed to create archive: {}", output.display()))?;
        let mut writer = ZipWriter::new(file);

        for relative in walk_files(&source) {
            let relative = relative?;
            let entry_name = entry_name(root, &relative);

            writer
                .start_file(entry_name.as_str(), Self::options())
                .map_err(|e| archive_error(format!("failed to add {entry_name}: {e}")))?;
            let mut input = File::open(source.join(&relative))
                .with_context(|| format!("Failed to read task file: {}", relative.display()))?;
            io::copy(&mut input, &mut writer)
                .with_context(|| format!("Failed to write {entry_name} to archive"))?;
        }

        writer.finish().map_err(|e| archive_error(format!("failed to finish archive: {e}")))?;
        Ok(())
    }
}

/// Archive entry name: `/`-separated on every platform.
fn entry_name(root: &str, relative: &Path) -> String {
    let mut name = root.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

fn archive_error(reason: impl Into<String>) -> AppUtilError {
    AppUtilError::ArchiveBuild {
        reason: reason.into(),
    }
}

/// A freshly built archive inside its private workspace.
///
/// The workspace (holding the `tasks/` snapshot and `tasks.zip`) is deleted
/// when the artifact is dropped; copy the archive out before then.
#[derive(Debug)]
pub struct ArchiveArtifact {
    workspace: TempDir,
    path: PathBuf,
}

impl ArchiveArtifact {
    /// Path of `tasks.zip` inside the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The snapshot of the dependency directory the archive was built from.
    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.workspace.path().join(TASKS_DIR)
    }

    /// Copy the archive to `destination`.
    pub fn copy_to(&self, destination: &Path) -> Result<()> {
        std::fs::copy(&self.path, destination).with_context(|| {
            format!("Failed to copy {} to {}", self.path.display(), destination.display())
        })?;
        Ok(())
    }
}

/// Builds dependency archives with one selected strategy.
#[derive(Debug, Clone)]
pub struct Archiver {
    strategy: Arc<dyn ArchiveStrategy>,
}

impl Archiver {
    /// Pick [`ExternalZip`] when `zip` is on `PATH`, else [`BuiltinZip`].
    #[must_use]
    pub fn detect() -> Self {
        if command_exists(ZIP_COMMAND) {
            Self::with_strategy(ExternalZip)
        } else {
            tracing::debug!("{} not found on PATH, archiving in-process", ZIP_COMMAND);
            Self::with_strategy(BuiltinZip)
        }
    }

    pub fn with_strategy(strategy: impl ArchiveStrategy + 'static) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Snapshot `dependencies_dir` and archive it as `tasks.zip`, rooted at `tasks/`.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be made, or with
    /// [`AppUtilError::ArchiveBuild`] if the strategy fails.
    pub fn build_archive(&self, dependencies_dir: &Path) -> Result<ArchiveArtifact> {
        if !dependencies_dir.is_dir() {
            return Err(archive_error(format!(
                "{} is not a directory",
                dependencies_dir.display()
            ))
            .into());
        }

        let workspace = tempfile::Builder::new()
            .prefix("biominer-tasks-")
            .tempdir()
            .context("Failed to create archive workspace")?;
        copy_dir(dependencies_dir, &workspace.path().join(TASKS_DIR))?;

        let path = workspace.path().join(ARCHIVE_FILE);
        tracing::debug!(
            "Archiving {} with {} into {}",
            dependencies_dir.display(),
            self.strategy.name(),
            path.display()
        );
        self.strategy.build(workspace.path(), TASKS_DIR, &path)?;

        Ok(ArchiveArtifact {
            workspace,
            path,
        })
    }
}

/// Build a dependency archive with the strategy detected for this host.
pub fn build_archive(dependencies_dir: &Path) -> Result<ArchiveArtifact> {
    Archiver::detect().build_archive(dependencies_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn task_dir() -> TempDir {
        let temp = tempdir().unwrap();
        let tasks = temp.path().join("tasks");
        std::fs::create_dir_all(tasks.join("qc")).unwrap();
        std::fs::write(tasks.join("align.wdl"), "task align {}").unwrap();
        std::fs::write(tasks.join("qc/fastqc.wdl"), "task fastqc {}").unwrap();
        temp
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect()
    }

    #[test]
    fn test_builtin_archive_layout() {
        let source = task_dir();
        let archiver = Archiver::with_strategy(BuiltinZip);

        let artifact = archiver.build_archive(&source.path().join("tasks")).unwrap();

        assert_eq!(entry_names(artifact.path()), vec!["tasks/align.wdl", "tasks/qc/fastqc.wdl"]);

        let mut archive = zip::ZipArchive::new(File::open(artifact.path()).unwrap()).unwrap();
        let mut content = String::new();
        archive.by_name("tasks/qc/fastqc.wdl").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "task fastqc {}");
    }

    #[test]
    fn test_builtin_archive_is_version_1_0() {
        let source = task_dir();
        let artifact =
            Archiver::with_strategy(BuiltinZip).build_archive(&source.path().join("tasks")).unwrap();

        let bytes = std::fs::read(artifact.path()).unwrap();
        // Local file header: signature, then "version needed to extract"
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 10);

        let archive = zip::ZipArchive::new(File::open(artifact.path()).unwrap()).unwrap();
        assert!(archive.file_names().all(|name| !name.ends_with('/')));
    }

    #[test]
    fn test_builtin_archive_is_reproducible() {
        let source = task_dir();
        let archiver = Archiver::with_strategy(BuiltinZip);

        let first = archiver.build_archive(&source.path().join("tasks")).unwrap();
        let second = archiver.build_archive(&source.path().join("tasks")).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), std::fs::read(second.path()).unwrap());
    }

    #[test]
    fn test_empty_task_dir() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("tasks")).unwrap();

        let artifact =
            Archiver::with_strategy(BuiltinZip).build_archive(&temp.path().join("tasks")).unwrap();
        assert!(entry_names(artifact.path()).is_empty());
        assert!(artifact.snapshot_dir().is_dir());
    }

    #[test]
    fn test_missing_source_dir() {
        let temp = tempdir().unwrap();
        let err = build_archive(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppUtilError>(),
            Some(AppUtilError::ArchiveBuild {
                ..
            })
        ));
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let source = task_dir();
        let artifact =
            Archiver::with_strategy(BuiltinZip).build_archive(&source.path().join("tasks")).unwrap();
        let path = artifact.path().to_path_buf();

        let out = tempdir().unwrap();
        artifact.copy_to(&out.path().join("tasks.zip")).unwrap();
        drop(artifact);

        assert!(!path.exists());
        assert!(out.path().join("tasks.zip").exists());
    }

    #[test]
    fn test_external_zip_when_available() {
        if !command_exists(ZIP_COMMAND) {
            return;
        }
        let source = task_dir();
        let artifact =
            Archiver::with_strategy(ExternalZip).build_archive(&source.path().join("tasks")).unwrap();

        let mut names = entry_names(artifact.path());
        names.sort();
        assert_eq!(names, vec!["tasks/align.wdl", "tasks/qc/fastqc.wdl"]);

        let bytes = std::fs::read(artifact.path()).unwrap();
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 10);

        let mut archive = zip::ZipArchive::new(File::open(artifact.path()).unwrap()).unwrap();
        for i in 0..archive.len() {
            let entry = archive.by_index(i).unwrap();
            assert_eq!(entry.compression(), CompressionMethod::Stored, "{}", entry.name());
        }
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("tasks", Path::new("qc").join("fastqc.wdl").as_path()), "tasks/qc/fastqc.wdl");
    }
}
