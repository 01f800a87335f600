//! Read-only commands over installed apps: `apps`, `manual`, `vars`, `check`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{CommandContext, locate_app};
use crate::core::{App, AppUtilError};
use crate::registry;
use crate::resolver::{VariableSource, check_app_variables, get_all_variables};
use crate::samples::read_header;

/// List installed apps.
#[derive(Args, Debug)]
pub struct AppsCommand {
    /// App root to list
    #[arg(long)]
    base_dir: Option<String>,
}

impl AppsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_root = ctx.app_root(self.base_dir.as_deref())?;
        let apps = registry::list_apps(&app_root)?;

        if apps.is_empty() {
            println!("No apps installed under {}", app_root.display());
            return Ok(());
        }
        for app in apps {
            println!("{app}");
        }
        Ok(())
    }
}

/// Print an app's README.
#[derive(Args, Debug)]
pub struct ManualCommand {
    app: String,

    #[arg(long)]
    base_dir: Option<String>,
}

impl ManualCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_root = ctx.app_root(self.base_dir.as_deref())?;
        match registry::read_manual(&app_root, &self.app)? {
            Some(manual) => print!("{manual}"),
            None => println!("No manual entry for {}", self.app),
        }
        Ok(())
    }
}

/// Print the variables an app's templates need.
#[derive(Args, Debug)]
pub struct VarsCommand {
    app: String,

    /// Leave out variables that have a default
    #[arg(long)]
    no_default: bool,

    #[arg(long)]
    base_dir: Option<String>,
}

impl VarsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app = App::open(&locate_app(&ctx.app_root(self.base_dir.as_deref())?, &self.app)?)?;
        for variable in get_all_variables(&app, self.no_default)? {
            println!("{variable}");
        }
        Ok(())
    }
}

/// Check that a samples file provides every variable an app needs.
#[derive(Args, Debug)]
pub struct CheckCommand {
    app: String,

    /// Samples file (JSON or CSV)
    samples: PathBuf,

    /// Do not require variables that have a default
    #[arg(long)]
    no_default: bool,

    #[arg(long)]
    base_dir: Option<String>,
}

impl CheckCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app = App::open(&locate_app(&ctx.app_root(self.base_dir.as_deref())?, &self.app)?)?;
        let header = read_header(&self.samples)?;

        if check_app_variables(&app, VariableSource::Header(&header), self.no_default)? {
            println!("{} {} provides every variable of {}", "✓".green(), self.samples.display(), app.name());
            Ok(())
        } else {
            Err(AppUtilError::MalformedInput {
                file: self.samples.display().to_string(),
                reason: format!("missing variables required by {}", app.name()),
            }
            .into())
        }
    }
}
