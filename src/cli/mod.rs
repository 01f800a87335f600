//! Command-line interface for `app-utility`.
//!
//! Each subcommand lives in its own module with a clap `Args` struct and an
//! `execute` method. [`Cli::execute`] loads the configuration once and hands
//! the resulting [`CommandContext`] to the subcommand.
//!
//! # Commands
//!
//! - `render` - render an app for every sample of a samples file
//! - `install` / `uninstall` - manage installed apps
//! - `apps` - list installed apps
//! - `defaults` - show or set an app's default variables
//! - `vars` - list the variables an app needs
//! - `check` - check a samples file against an app
//! - `manual` - print an app's README
//! - `config` - manage the configuration file
//! - `version` - print the version
//!
//! # Global options
//!
//! - `--verbose` / `--quiet` select the log level (`RUST_LOG` wins over both)
//! - `--no-progress` hides progress bars
//! - `--config <path>` reads another config file

mod apps;
pub mod common;
mod config;
mod defaults;
mod install;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use common::CommandContext;

use crate::constants::VERSION;

/// Settings derived from the global flags, applied before any command runs.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `tracing` filter directive; `None` disables logging
    pub log_level: Option<String>,
    pub no_progress: bool,
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self) {
        if self.no_progress {
            crate::utils::progress::disable_progress();
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "app-utility",
    about = "Render bioinformatics app templates into per-sample pipeline projects",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of ~/.biominer/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an app for every sample of a samples file
    Render(render::RenderCommand),

    /// Install an app from the app store or a zip archive
    Install(install::InstallCommand),

    /// Remove an installed app
    Uninstall(install::UninstallCommand),

    /// List installed apps
    Apps(apps::AppsCommand),

    /// Show or set an app's default variables
    Defaults(defaults::DefaultsCommand),

    /// List the variables an app's templates need
    Vars(apps::VarsCommand),

    /// Check that a samples file provides every variable an app needs
    Check(apps::CheckCommand),

    /// Print an app's manual
    Manual(apps::ManualCommand),

    /// Manage the configuration file
    Config(config::ConfigCommand),

    /// Print the version
    Version,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply();

        if matches!(self.command, Commands::Version) {
            println!("{VERSION}");
            return Ok(());
        }

        let ctx = CommandContext::load(config.config_path).await?;
        match self.command {
            Commands::Render(cmd) => cmd.execute(&ctx).await,
            Commands::Install(cmd) => cmd.execute(&ctx).await,
            Commands::Uninstall(cmd) => cmd.execute(&ctx).await,
            Commands::Apps(cmd) => cmd.execute(&ctx),
            Commands::Defaults(cmd) => cmd.execute(&ctx),
            Commands::Vars(cmd) => cmd.execute(&ctx),
            Commands::Check(cmd) => cmd.execute(&ctx),
            Commands::Manual(cmd) => cmd.execute(&ctx),
            Commands::Config(cmd) => cmd.execute(&ctx).await,
            Commands::Version => Ok(()),
        }
    }
}
