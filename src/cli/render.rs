//! Render an app into one project directory per sample.
//!
//! ```bash
//! app-utility render wes-latest samples.csv --project-name cohort1
//! app-utility render ./my-app samples.json --project-name cohort1 --work-dir /data --force
//! ```
//!
//! Every sample is attempted; the command fails (exit code 1, or 3 when a
//! rendered `inputs` document was not valid JSON) if any sample failed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, locate_app};
use crate::core::AppUtilError;
use crate::materialize::{RenderOptions, RenderReport, render_app};
use crate::utils::platform::resolve_path;

#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Installed app name or path to an app directory
    app: String,

    /// Samples file (JSON or CSV)
    samples: PathBuf,

    /// Project name; becomes `project_name` in templates
    #[arg(long, short = 'p')]
    project_name: String,

    /// Directory the project is created in
    #[arg(long)]
    work_dir: Option<String>,

    /// App root to look the app up in
    #[arg(long)]
    base_dir: Option<String>,

    /// Reuse existing sample directories
    #[arg(long)]
    force: bool,

    /// Expand sample values that contain encoded JSON
    #[arg(long)]
    parse_json: bool,

    /// Samples rendered concurrently
    #[arg(long)]
    max_parallel: Option<usize>,
}

impl RenderCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_dir = locate_app(&ctx.app_root(self.base_dir.as_deref())?, &self.app)?;
        let work_dir = match &self.work_dir {
            Some(dir) => resolve_path(dir)?,
            None => ctx.settings.project_root_dir.clone(),
        };

        let options = RenderOptions::new(&self.project_name, work_dir)
            .force(self.force)
            .parse_json(self.parse_json)
            .max_parallel(self.max_parallel.unwrap_or(ctx.settings.max_parallel));
        let project_dir = options.project_dir();

        let report = render_app(&app_dir, &self.samples, options).await?;
        print_summary(&report, &project_dir);
        report.into_result().map(|_| ())
    }
}

fn print_summary(report: &RenderReport, project_dir: &std::path::Path) {
    for outcome in report.failed() {
        if let Err(e) = &outcome.result {
            eprintln!("{} {} ({}): {:#}", "✗".red(), outcome.sample_id.bold(), outcome.stage, e);
        }
        if let Some(AppUtilError::InvalidRenderedOutput {
            snippet,
            ..
        }) = outcome.error()
        {
            eprintln!("{snippet}");
        }
    }

    let succeeded = report.succeeded().count();
    if report.is_success() {
        println!(
            "{} Rendered {} sample(s) into {}",
            "✓".green(),
            succeeded,
            project_dir.display()
        );
    } else {
        println!(
            "{} {} of {} sample(s) rendered into {}",
            "!".yellow(),
            succeeded,
            report.outcomes.len(),
            project_dir.display()
        );
    }
}
