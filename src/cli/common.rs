//! Helpers shared by the subcommands.

use anyhow::Result;
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{GlobalConfig, Settings};
use crate::core::AppUtilError;
use crate::utils::platform::resolve_path;

/// Effective settings for one command invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub settings: Settings,
    /// Config file given with `--config`, if any
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Load the config file and layer the environment over it.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = GlobalConfig::load_with_optional(config_path.clone()).await?;
        let settings = config.resolve()?;
        tracing::debug!("Effective settings: {:?}", settings);
        Ok(Self {
            settings,
            config_path,
        })
    }

    /// `--base-dir` if given, else the configured app root.
    pub fn app_root(&self, base_dir: Option<&str>) -> Result<PathBuf> {
        match base_dir {
            Some(dir) => resolve_path(dir),
            None => Ok(self.settings.app_root_dir.clone()),
        }
    }
}

/// Locate an app by installed name, falling back to a literal directory.
///
/// # Errors
///
/// [`AppUtilError::AppNotFound`] when neither exists.
pub fn locate_app(app_root: &Path, app: &str) -> Result<PathBuf> {
    let installed = app_root.join(app);
    if installed.is_dir() {
        return Ok(installed);
    }

    let literal = resolve_path(app)?;
    if literal.is_dir() {
        return Ok(literal);
    }

    Err(AppUtilError::AppNotFound {
        name: app.to_string(),
    }
    .into())
}

/// Ask a Yes/No question on the terminal until answered.
///
/// Returns `false` without prompting when stdin is not a terminal.
pub async fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        eprintln!("{}", "Not an interactive terminal; pass --yes to confirm.".yellow());
        return Ok(false);
    }

    let mut reader = BufReader::new(tokio::io::stdin());
    loop {
        print!("{} ", format!("{question} [Yes/No]:").green());
        io::stdout().flush()?;

        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Ok(false);
        }
        match parse_answer(&response) {
            Some(answer) => return Ok(answer),
            None => println!("Please answer Yes or No."),
        }
    }
}

fn parse_answer(response: &str) -> Option<bool> {
    match response.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
