//! Show or edit an app's default variables.
//!
//! ```bash
//! app-utility defaults wes-latest show
//! app-utility defaults wes-latest show reference threads
//! app-utility defaults wes-latest set threads:8 reference:hg38
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::common::{CommandContext, locate_app};
use crate::defaults::{DefaultVariables, parse_kv_list};

#[derive(Args, Debug)]
pub struct DefaultsCommand {
    /// Installed app name or path to an app directory
    app: String,

    #[arg(long)]
    base_dir: Option<String>,

    #[command(subcommand)]
    command: DefaultsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DefaultsSubcommand {
    /// Print defaults as JSON; all of them when no key is given
    Show {
        keys: Vec<String>,
    },

    /// Set defaults from `key:value` pairs and save them
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

impl DefaultsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let app_dir = locate_app(&ctx.app_root(self.base_dir.as_deref())?, &self.app)?;
        let mut defaults = DefaultVariables::load(&app_dir)?;

        match self.command {
            DefaultsSubcommand::Show {
                keys,
            } => {
                let subset = defaults.show_subset(&keys);
                println!("{}", serde_json::to_string_pretty(&subset)?);
            }
            DefaultsSubcommand::Set {
                pairs,
            } => {
                let vars = parse_kv_list(&pairs)?;
                let count = vars.len();
                defaults.set_many(vars);
                defaults.save()?;
                println!("{} Saved {} default(s) to {}", "✓".green(), count, defaults.path().display());
            }
        }
        Ok(())
    }
}
