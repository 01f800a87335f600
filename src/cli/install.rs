//! Install and uninstall apps.
//!
//! ```bash
//! app-utility install choppy/wes:v1.0 --username me --password secret
//! app-utility install ./wes-v1.0.zip
//! app-utility uninstall choppy/wes-v1.0 --yes
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, confirm};
use crate::registry::{self, InstallOptions, InstallSource, StoreCredentials};

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// `namespace/app[:version]` or a path to a zip archive
    app: String,

    /// App store user name
    #[arg(long, short = 'u')]
    username: Option<String>,

    /// App store password
    #[arg(long, short = 'p', requires = "username")]
    password: Option<String>,

    /// App store URL
    #[arg(long, short = 'e')]
    endpoint: Option<String>,

    /// Reinstall when the app is already installed
    #[arg(long, short = 'f')]
    force: bool,

    /// App root to install into
    #[arg(long)]
    base_dir: Option<String>,
}

impl InstallCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_root = ctx.app_root(self.base_dir.as_deref())?;
        let source = InstallSource::parse(&self.app);

        let credentials = self.username.map(|username| StoreCredentials {
            username,
            password: self.password.unwrap_or_default(),
        });
        let options = InstallOptions {
            force: self.force,
            endpoint: self.endpoint.unwrap_or_else(|| ctx.settings.endpoint.clone()),
            credentials,
        };

        let installed = registry::install(&app_root, &source, &options).await?;
        println!("{} Installed {} to {}", "✓".green(), source.display_name().bold(), installed.display());
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct UninstallCommand {
    /// Installed app name as printed by `apps`
    app: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// App root to remove the app from
    #[arg(long)]
    base_dir: Option<String>,
}

impl UninstallCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_root = ctx.app_root(self.base_dir.as_deref())?;

        if !self.yes && !confirm(&format!("Are you sure you want to uninstall {}?", self.app)).await? {
            println!("{}", "Uninstall cancelled.".yellow());
            return Ok(());
        }

        let removed = registry::uninstall(&app_root, &self.app)?;
        println!("{} Uninstalled {} from {}", "✓".green(), self.app.bold(), removed.display());
        Ok(())
    }
}
