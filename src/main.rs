//! `app-utility` entry point.
//!
//! Parses arguments, installs the log subscriber, runs the command, and maps
//! failures to a coloured report and a process exit code.

use anyhow::Result;
use biominer_app_util::cli;
use biominer_app_util::core::{exit_code_for, user_friendly_error};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.build_config();
    init_logging(config.log_level.as_deref());

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute_with_config(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let code = exit_code_for(&e);
            user_friendly_error(e).display();
            std::process::exit(code);
        }
    }
}

/// `RUST_LOG` when set, else the level chosen by `--verbose` / `--quiet`.
fn init_logging(level: Option<&str>) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(level.unwrap_or("off")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
