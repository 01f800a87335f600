//! Manage the user configuration file.
//!
//! ```bash
//! app-utility config init
//! app-utility config show
//! app-utility config path
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::common::CommandContext;
use crate::config::GlobalConfig;

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: Option<ConfigSubcommand>,
}

#[derive(Subcommand, Debug)]
enum ConfigSubcommand {
    /// Write a commented example config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective settings (the default)
    Show,

    /// Print the config file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let config_path = match &ctx.config_path {
            Some(path) => path.clone(),
            None => GlobalConfig::default_path()?,
        };

        match self.command {
            Some(ConfigSubcommand::Init {
                force,
            }) => init(config_path, force).await,
            Some(ConfigSubcommand::Show) | None => {
                show(ctx, &config_path);
                Ok(())
            }
            Some(ConfigSubcommand::Path) => {
                println!("{}", config_path.display());
                Ok(())
            }
        }
    }
}

async fn init(config_path: PathBuf, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!("{} Config already exists at: {}", "✗".red(), config_path.display());
        println!("   Use --force to overwrite");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    tokio::fs::write(&config_path, GlobalConfig::init_example())
        .await
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!("{} Created config at: {}", "✓".green(), config_path.display());
    Ok(())
}

fn show(ctx: &CommandContext, config_path: &std::path::Path) {
    let settings = &ctx.settings;
    println!("{}", "Configuration".bold());
    println!("Location: {}\n", config_path.display());
    println!("app_root_dir     = {}", settings.app_root_dir.display());
    println!("project_root_dir = {}", settings.project_root_dir.display());
    println!("endpoint         = {}", settings.endpoint);
    println!("max_parallel     = {}", settings.max_parallel);
}
