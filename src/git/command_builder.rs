//! Builder for git subprocesses
//!
//! Wraps `tokio::process::Command` with a timeout, debug logging, and
//! conversion of failures into [`AppUtilError::GitCommandFailed`]. Arguments
//! holding credentials can be registered as secrets so they never reach logs
//! or error messages.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::AppUtilError;
use crate::utils::platform::is_windows;

/// Default time allowed for one git invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const REDACTED: &str = "<redacted>";

/// Git executable name for the current platform.
#[must_use]
pub const fn git_command() -> &'static str {
    if is_windows() { "git.exe" } else { "git" }
}

/// A git invocation under construction.
///
/// ```rust,ignore
/// GitCommand::clone_branch("http://store/ns/wes.git", "master", &dest)
///     .with_context("Installing ns/wes")
///     .execute_success()
///     .await?;
/// ```
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    secrets: Vec<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Some(DEFAULT_TIMEOUT),
            context: None,
            secrets: Vec::new(),
        }
    }
}

impl GitCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git with `-C dir`, leaving the process working directory alone.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label used in log lines for this command.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Hide `secret` wherever it appears in logs and error messages.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
        self
    }

    fn redact(&self, text: &str) -> String {
        self.secrets.iter().fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    /// Run the command and return its trimmed stdout.
    ///
    /// # Errors
    ///
    /// [`AppUtilError::GitCommandFailed`] on a non-zero exit or a timeout.
    pub async fn execute(self) -> Result<String> {
        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        let shown = self.redact(&full_args.join(" "));
        match &self.context {
            Some(ctx) => tracing::debug!(target: "git", "({}) Executing: git {}", ctx, shown),
            None => tracing::debug!(target: "git", "Executing: git {}", shown),
        }

        let mut cmd = Command::new(git_command());
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Fail instead of blocking on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0");

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result.with_context(|| format!("Failed to execute git {shown}"))?,
                Err(_) => {
                    tracing::warn!(target: "git", "git {} timed out after {}s", shown, duration.as_secs());
                    return Err(AppUtilError::GitCommandFailed {
                        operation: self.operation(),
                        stderr: format!(
                            "Timed out after {} seconds. Check network connectivity to the app store.",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            },
            None => output_future.await.with_context(|| format!("Failed to execute git {shown}"))?,
        };

        let stderr = self.redact(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            tracing::debug!(target: "git", "git exited with {:?}: {}", output.status.code(), stderr.trim());
            return Err(AppUtilError::GitCommandFailed {
                operation: self.operation(),
                stderr,
            }
            .into());
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(target: "git", "{}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

impl GitCommand {
    /// Shallow clone of one branch or tag into `target`.
    #[must_use]
    pub fn clone_branch(url: &str, branch: &str, target: impl AsRef<Path>) -> Self {
        let target = target.as_ref().display().to_string();
        Self::new().args(["clone", "-b", branch, "--single-branch", "-q", "--depth", "1", url, target.as_str()])
    }
}
