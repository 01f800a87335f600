//! Per-sample project materialization.
//!
//! For every sample of a batch a directory `<work_dir>/<project>/<sample_id>`
//! is produced:
//!
//! ```text
//! demo/S1/
//! ├── inputs          # rendered, validated JSON
//! ├── workflow.wdl    # rendered workflow
//! ├── defaults        # copied from the app, when present
//! ├── tasks/          # copy of the app's task directory
//! └── tasks.zip       # archive of the task directory
//! ```
//!
//! Each sample walks the [`Stage`] sequence on Tokio's blocking pool. A
//! failing sample stops at the stage it reached and is reported in the
//! [`RenderReport`]; the other samples are unaffected. Batch preconditions
//! (valid app, parseable templates, a unique `sample_id` in every record) are
//! checked before any directory is created.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::Archiver;
use crate::constants::{ARCHIVE_FILE, DEFAULTS_FILE, INPUTS_FILE, MIN_PARALLELISM, TASKS_DIR, WORKFLOW_FILE};
use crate::core::{App, AppUtilError};
use crate::defaults::DefaultVariables;
use crate::resolver::resolve;
use crate::samples::{SampleBatch, SampleRecord, parse_samples};
use crate::templating::TemplateRenderer;
use crate::utils::fs::{ensure_dir, is_path_component, replace_dir, safe_write};
use crate::utils::progress::ProgressBar;
use crate::validation::check_json;

/// Steps of one sample's materialization, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    DirectoryChecked,
    InputsRendered,
    InputsValidated,
    InputsWritten,
    WorkflowRendered,
    WorkflowWritten,
    DefaultsCopied,
    DependenciesCopied,
    ArchiveBuilt,
    ArchiveAttached,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::DirectoryChecked => "directory checked",
            Self::InputsRendered => "inputs rendered",
            Self::InputsValidated => "inputs validated",
            Self::InputsWritten => "inputs written",
            Self::WorkflowRendered => "workflow rendered",
            Self::WorkflowWritten => "workflow written",
            Self::DefaultsCopied => "defaults copied",
            Self::DependenciesCopied => "dependencies copied",
            Self::ArchiveBuilt => "archive built",
            Self::ArchiveAttached => "archive attached",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Settings of one render run.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Name of the project; injected as `project_name` and used as the
    /// directory grouping the samples
    pub project_name: String,
    /// Directory the project directory is created in
    pub work_dir: PathBuf,
    /// Reuse existing sample directories instead of failing
    pub force: bool,
    /// Maximum number of samples rendered concurrently
    pub max_parallel: usize,
    /// Expand sample values that hold encoded JSON before rendering
    pub parse_json: bool,
}

impl RenderOptions {
    #[must_use]
    pub fn new(project_name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_name: project_name.into(),
            work_dir: work_dir.into(),
            force: false,
            max_parallel: crate::constants::default_max_parallel(),
            parse_json: false,
        }
    }

    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(MIN_PARALLELISM);
        self
    }

    #[must_use]
    pub const fn parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }

    /// `<work_dir>/<project_name>`
    #[must_use]
    pub fn project_dir(&self) -> PathBuf {
        self.work_dir.join(&self.project_name)
    }

    /// Check that the project directory stays inside `work_dir`.
    ///
    /// # Errors
    ///
    /// [`AppUtilError::ConfigError`] when `project_name` is empty, `.`, `..`,
    /// absolute, or contains a path separator.
    pub fn validate(&self) -> Result<()> {
        if !is_path_component(&self.project_name) {
            return Err(AppUtilError::ConfigError {
                message: format!("project name '{}' is not a plain directory name", self.project_name),
            }
            .into());
        }
        Ok(())
    }
}

/// Result of materializing one sample.
#[derive(Debug)]
pub struct SampleOutcome {
    pub sample_id: String,
    /// Last stage reached; [`Stage::Done`] on success
    pub stage: Stage,
    /// The sample directory on success
    pub result: Result<PathBuf>,
}

impl SampleOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The typed error of a failed sample, if it has one.
    #[must_use]
    pub fn error(&self) -> Option<&AppUtilError> {
        self.result.as_ref().err().and_then(|e| e.downcast_ref::<AppUtilError>())
    }
}

/// Outcomes of a batch, in samples-file order.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub outcomes: Vec<SampleOutcome>,
}

impl RenderReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SampleOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(SampleOutcome::is_success)
    }

    /// Whether any sample failed because its rendered inputs were not JSON.
    #[must_use]
    pub fn has_invalid_json(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(
                o.error(),
                Some(AppUtilError::InvalidRenderedOutput {
                    ..
                })
            )
        })
    }

    /// Turn a partially failed report into [`AppUtilError::SamplesFailed`].
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed().count();
        if failed == 0 {
            return Ok(self);
        }
        Err(AppUtilError::SamplesFailed {
            failed,
            total: self.outcomes.len(),
            invalid_json: self.has_invalid_json(),
        }
        .into())
    }
}

/// Shared state for materializing the samples of one batch.
///
/// Everything is read-only once built and shared with workers through `Arc`.
#[derive(Clone)]
pub struct Materializer {
    app: Arc<App>,
    renderer: Arc<TemplateRenderer>,
    defaults: Arc<DefaultVariables>,
    archiver: Archiver,
    options: Arc<RenderOptions>,
}

impl Materializer {
    /// Load the app's templates and defaults and probe for an archiver.
    ///
    /// # Errors
    ///
    /// [`AppUtilError::TemplateSyntax`] if a template does not parse, or a
    /// defaults file that is not a JSON object.
    pub fn new(app: App, options: RenderOptions) -> Result<Self> {
        Self::with_archiver(app, options, Archiver::detect())
    }

    pub fn with_archiver(app: App, options: RenderOptions, archiver: Archiver) -> Result<Self> {
        options.validate()?;
        let renderer = TemplateRenderer::for_app(&app)?;
        let defaults = DefaultVariables::load(app.root())?;
        tracing::debug!(
            "Materializing {} with {} default(s), archiving with {}",
            app.name(),
            defaults.len(),
            archiver.strategy_name()
        );

        Ok(Self {
            app: Arc::new(app),
            renderer: Arc::new(renderer),
            defaults: Arc::new(defaults),
            archiver,
            options: Arc::new(options),
        })
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Materialize one sample, catching any failure in the outcome.
    ///
    /// The record must carry a `sample_id`; batches are checked with
    /// [`SampleBatch::require_sample_ids`] before this is called.
    #[must_use]
    pub fn materialize_sample(&self, record: SampleRecord) -> SampleOutcome {
        let sample_id = record.sample_id().unwrap_or_default();
        let mut stage = Stage::Start;
        let result = self.run_stages(&sample_id, record, &mut stage);

        match &result {
            Ok(dir) => tracing::info!("Rendered {} into {}", sample_id, dir.display()),
            Err(e) => tracing::error!("Sample {} failed after stage '{}': {:#}", sample_id, stage, e),
        }

        SampleOutcome {
            sample_id,
            stage,
            result,
        }
    }

    fn run_stages(&self, sample_id: &str, record: SampleRecord, stage: &mut Stage) -> Result<PathBuf> {
        if !is_path_component(sample_id) {
            return Err(AppUtilError::MalformedInput {
                file: "samples".to_string(),
                reason: format!("unusable sample_id '{sample_id}'"),
            }
            .into());
        }

        let sample_dir = self.options.project_dir().join(sample_id);
        check_directory(&sample_dir, self.options.force)?;
        *stage = Stage::DirectoryChecked;

        let context = resolve(record, &self.defaults, &self.options.project_name);

        let inputs = self.renderer.render(INPUTS_FILE, &context)?;
        *stage = Stage::InputsRendered;

        check_json(INPUTS_FILE, &inputs)?;
        *stage = Stage::InputsValidated;

        safe_write(&sample_dir.join(INPUTS_FILE), &inputs)?;
        *stage = Stage::InputsWritten;

        let workflow = self.renderer.render(WORKFLOW_FILE, &context)?;
        *stage = Stage::WorkflowRendered;

        safe_write(&sample_dir.join(WORKFLOW_FILE), &workflow)?;
        *stage = Stage::WorkflowWritten;

        let defaults_path = self.app.defaults_path();
        if defaults_path.is_file() {
            std::fs::copy(&defaults_path, sample_dir.join(DEFAULTS_FILE))
                .with_context(|| format!("Failed to copy {}", defaults_path.display()))?;
        }
        *stage = Stage::DefaultsCopied;

        replace_dir(&self.app.tasks_dir(), &sample_dir.join(TASKS_DIR))?;
        *stage = Stage::DependenciesCopied;

        let artifact = self.archiver.build_archive(&self.app.tasks_dir())?;
        *stage = Stage::ArchiveBuilt;

        artifact.copy_to(&sample_dir.join(ARCHIVE_FILE))?;
        *stage = Stage::ArchiveAttached;

        *stage = Stage::Done;
        Ok(sample_dir)
    }

    /// Materialize every record of `batch` concurrently.
    ///
    /// # Errors
    ///
    /// Fails before touching the filesystem when a record lacks a
    /// `sample_id` or two records share one. Per-sample failures are
    /// reported in the returned [`RenderReport`], not as an error.
    pub async fn render_batch(&self, batch: SampleBatch) -> Result<RenderReport> {
        batch.require_sample_ids()?;
        batch.require_unique_sample_ids()?;

        let records =
            if self.options.parse_json { batch.deep_unwrapped().into_records() } else { batch.into_records() };

        ensure_dir(&self.options.project_dir())?;

        let progress = ProgressBar::new(records.len() as u64);
        progress.set_prefix("Rendering");

        let mut indexed: Vec<(usize, SampleOutcome)> = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| {
                let materializer = self.clone();
                let progress = progress.clone();
                async move {
                    let sample_id = record.sample_id().unwrap_or_default();
                    progress.set_message(sample_id.clone());
                    let outcome = tokio::task::spawn_blocking(move || materializer.materialize_sample(record))
                        .await
                        .unwrap_or_else(|e| SampleOutcome {
                            sample_id,
                            stage: Stage::Start,
                            result: Err(anyhow::anyhow!("Render task failed: {e}")),
                        });
                    progress.inc(1);
                    (index, outcome)
                }
            })
            .buffer_unordered(self.options.max_parallel.max(MIN_PARALLELISM))
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let report = RenderReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        progress.finish_and_clear();
        tracing::info!(
            "Rendered {} of {} sample(s) into {}",
            report.succeeded().count(),
            report.outcomes.len(),
            self.options.project_dir().display()
        );

        Ok(report)
    }
}

/// Create the sample directory, or accept an existing one when `force` is set.
fn check_directory(sample_dir: &Path, force: bool) -> Result<()> {
    if sample_dir.exists() {
        if !force {
            return Err(AppUtilError::DirectoryConflict {
                path: sample_dir.display().to_string(),
            }
            .into());
        }
        if !sample_dir.is_dir() {
            return Err(anyhow::anyhow!("{} exists and is not a directory", sample_dir.display()));
        }
        return Ok(());
    }
    ensure_dir(sample_dir)
}

/// Open the app at `app_dir`, parse `samples_path`, and render every sample.
///
/// # Errors
///
/// Batch-level failures only: an invalid app, an unusable samples file, or
/// unparseable templates. Use [`RenderReport::into_result`] to turn sample
/// failures into an error.
pub async fn render_app(app_dir: &Path, samples_path: &Path, options: RenderOptions) -> Result<RenderReport> {
    let app = App::open(app_dir)?;
    let batch = parse_samples(samples_path)?;
    // Reject a bad batch before the templates are even loaded
    batch.require_sample_ids()?;

    let materializer = Materializer::new(app, options)?;
    materializer.render_batch(batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::BuiltinZip;
    use crate::test_utils::{AppFixture, init_test_logging};
    use serde_json::json;
    use tempfile::TempDir;

    fn materializer(fixture: &AppFixture, work: &TempDir, force: bool) -> Materializer {
        init_test_logging(None);
        let options = RenderOptions::new("demo", work.path()).force(force).max_parallel(2);
        Materializer::with_archiver(fixture.app(), options, Archiver::with_strategy(BuiltinZip)).unwrap()
    }

    fn record(value: serde_json::Value) -> SampleRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_materialize_sample_layout() {
        let fixture = AppFixture::builder()
            .inputs(r#"{"id": "{{sample_id}}", "project": "{{project_name}}"}"#)
            .defaults(json!({"genome": "hg38"}))
            .task("align.wdl", "task align {}")
            .build();
        let work = TempDir::new().unwrap();

        let outcome = materializer(&fixture, &work, false).materialize_sample(record(json!({"sample_id": "S1"})));

        assert_eq!(outcome.stage, Stage::Done);
        let dir = outcome.result.unwrap();
        assert_eq!(dir, work.path().join("demo/S1"));

        let inputs: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("inputs")).unwrap()).unwrap();
        assert_eq!(inputs, json!({"id": "S1", "project": "demo"}));
        assert!(dir.join("workflow.wdl").is_file());
        assert!(dir.join("defaults").is_file());
        assert!(dir.join("tasks/align.wdl").is_file());
        assert!(dir.join("tasks.zip").is_file());
    }

    #[test]
    fn test_directory_conflict_leaves_files_untouched() {
        let fixture = AppFixture::builder().build();
        let work = TempDir::new().unwrap();
        let existing = work.path().join("demo/S1");
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("inputs"), "old").unwrap();

        let outcome = materializer(&fixture, &work, false).materialize_sample(record(json!({"sample_id": "S1"})));

        assert_eq!(outcome.stage, Stage::Start);
        assert!(matches!(
            outcome.error(),
            Some(AppUtilError::DirectoryConflict {
                ..
            })
        ));
        assert_eq!(std::fs::read_to_string(existing.join("inputs")).unwrap(), "old");
        assert!(!existing.join("workflow.wdl").exists());
    }

    #[test]
    fn test_invalid_rendered_json_stops_before_writing() {
        let fixture = AppFixture::builder().inputs(r#"{"id": "{{sample_id}}",}"#).build();
        let work = TempDir::new().unwrap();

        let outcome = materializer(&fixture, &work, false).materialize_sample(record(json!({"sample_id": "S1"})));

        assert_eq!(outcome.stage, Stage::InputsRendered);
        match outcome.error() {
            Some(AppUtilError::InvalidRenderedOutput {
                line,
                column,
                ..
            }) => {
                assert_eq!(*line, 1);
                assert_eq!(*column, 13);
            }
            other => panic!("expected InvalidRenderedOutput, got {other:?}"),
        }
        assert!(!work.path().join("demo/S1/inputs").exists());
    }

    #[test]
    fn test_force_is_idempotent() {
        let fixture = AppFixture::builder().workflow("workflow w { String s = \"{{ sample_id }}\" }").build();
        let work = TempDir::new().unwrap();
        let materializer = materializer(&fixture, &work, true);

        let first = materializer.materialize_sample(record(json!({"sample_id": "S1"}))).result.unwrap();
        let inputs = std::fs::read(first.join("inputs")).unwrap();
        let workflow = std::fs::read(first.join("workflow.wdl")).unwrap();

        let second = materializer.materialize_sample(record(json!({"sample_id": "S1"}))).result.unwrap();
        assert_eq!(std::fs::read(second.join("inputs")).unwrap(), inputs);
        assert_eq!(std::fs::read(second.join("workflow.wdl")).unwrap(), workflow);
    }

    #[tokio::test]
    async fn test_render_batch_isolates_failures() {
        let fixture = AppFixture::builder().inputs(r#"{"id": "{{sample_id}}", "read": "{{ read1 }}"}"#).build();
        let work = TempDir::new().unwrap();
        let samples = work.path().join("samples.json");
        std::fs::write(
            &samples,
            r#"[{"sample_id": "S1", "read1": "a.fq"}, {"sample_id": "S2"}, {"sample_id": "S3", "read1": "c.fq"}]"#,
        )
        .unwrap();

        let batch = parse_samples(&samples).unwrap();
        let report = materializer(&fixture, &work, false).render_batch(batch).await.unwrap();

        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.sample_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
        assert_eq!(report.succeeded().count(), 2);
        assert!(matches!(
            report.outcomes[1].error(),
            Some(AppUtilError::UndefinedVariable {
                ..
            })
        ));
        assert!(work.path().join("demo/S3/inputs").is_file());

        let err = report.into_result().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppUtilError>(),
            Some(AppUtilError::SamplesFailed {
                failed: 1,
                total: 3,
                invalid_json: false,
            })
        ));
    }

    #[tokio::test]
    async fn test_render_batch_rejects_missing_sample_id_before_writing() {
        let fixture = AppFixture::builder().build();
        let work = TempDir::new().unwrap();
        let samples = work.path().join("samples.json");
        std::fs::write(&samples, r#"[{"sample_id": "S1"}, {"read1": "b.fq"}]"#).unwrap();

        let batch = parse_samples(&samples).unwrap();
        let err = materializer(&fixture, &work, false).render_batch(batch).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AppUtilError>(),
            Some(AppUtilError::MalformedInput {
                ..
            })
        ));
        assert!(!work.path().join("demo").exists());
    }

    #[tokio::test]
    async fn test_render_batch_keeps_samples_inside_project() {
        let fixture = AppFixture::builder().build();
        let work = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let escaped = outside.path().join("escaped");
        let samples = work.path().join("samples.json");
        let content = json!([{"sample_id": "S1"}, {"sample_id": escaped.display().to_string()}]);
        std::fs::write(&samples, content.to_string()).unwrap();

        let batch = parse_samples(&samples).unwrap();
        let err = materializer(&fixture, &work, true).render_batch(batch).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AppUtilError>(),
            Some(AppUtilError::MalformedInput {
                ..
            })
        ));
        assert!(!escaped.exists());
        assert!(!work.path().join("demo").exists());

        let outcome =
            materializer(&fixture, &work, true).materialize_sample(record(json!({"sample_id": "../../dotdot"})));
        assert!(!outcome.is_success());
        assert_eq!(outcome.stage, Stage::Start);
        assert!(!work.path().parent().unwrap().join("dotdot").exists());
    }

    #[test]
    fn test_sample_id_names_directory_verbatim() {
        let fixture = AppFixture::builder().inputs(r#"{"id": "{{ sample_id }}"}"#).build();
        let work = TempDir::new().unwrap();

        let outcome = materializer(&fixture, &work, false).materialize_sample(record(json!({"sample_id": " S9 "})));

        assert_eq!(outcome.sample_id, " S9 ");
        let dir = outcome.result.unwrap();
        assert_eq!(dir, work.path().join("demo").join(" S9 "));
        let inputs = std::fs::read_to_string(dir.join("inputs")).unwrap();
        assert_eq!(inputs, r#"{"id": " S9 "}"#);
    }

    #[test]
    fn test_project_name_must_be_a_directory_name() {
        let fixture = AppFixture::builder().build();
        let work = TempDir::new().unwrap();

        for name in ["", "..", "a/b", "/abs"] {
            let options = RenderOptions::new(name, work.path());
            let Err(err) = Materializer::with_archiver(fixture.app(), options, Archiver::with_strategy(BuiltinZip))
            else {
                panic!("project name {name:?} was accepted");
            };
            assert!(
                matches!(
                    err.downcast_ref::<AppUtilError>(),
                    Some(AppUtilError::ConfigError {
                        ..
                    })
                ),
                "{name:?}"
            );
        }
        assert!(RenderOptions::new("cohort1", work.path()).validate().is_ok());
    }

    #[tokio::test]
    async fn test_parse_json_option() {
        let fixture = AppFixture::builder().inputs(r#"{"lanes": {{ lanes | length }}}"#).build();
        let work = TempDir::new().unwrap();
        let samples = work.path().join("samples.csv");
        std::fs::write(&samples, "sample_id,lanes\nS1,\"[1,2,3]\"\n").unwrap();

        let options = RenderOptions::new("demo", work.path()).parse_json(true);
        let materializer =
            Materializer::with_archiver(fixture.app(), options, Archiver::with_strategy(BuiltinZip)).unwrap();
        let report = materializer.render_batch(parse_samples(&samples).unwrap()).await.unwrap();

        assert!(report.is_success());
        let inputs = std::fs::read_to_string(work.path().join("demo/S1/inputs")).unwrap();
        assert_eq!(inputs, r#"{"lanes": 3}"#);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Start < Stage::DirectoryChecked);
        assert!(Stage::ArchiveAttached < Stage::Done);
        assert_eq!(Stage::InputsValidated.to_string(), "inputs validated");
    }
}
