//! Error handling for app-utility
//!
//! This module provides the error taxonomy and user-friendly error reporting for
//! the app utility. The error system is built around two types:
//! - [`AppUtilError`] - Enumerated error types for every failure the tool reports
//! - [`ErrorContext`] - Wrapper that adds user-facing details and suggestions
//!
//! # Error Categories
//!
//! - **Apps**: [`AppUtilError::InvalidApp`], [`AppUtilError::AppNotFound`],
//!   [`AppUtilError::AppAlreadyInstalled`], [`AppUtilError::InstallFailed`]
//! - **Git**: [`AppUtilError::GitCommandFailed`]
//! - **Templates**: [`AppUtilError::TemplateSyntax`], [`AppUtilError::UndefinedVariable`]
//! - **Samples**: [`AppUtilError::MalformedInput`]
//! - **Rendering**: [`AppUtilError::DirectoryConflict`],
//!   [`AppUtilError::InvalidRenderedOutput`], [`AppUtilError::ArchiveBuild`],
//!   [`AppUtilError::SamplesFailed`]
//! - **Plumbing**: [`AppUtilError::Io`], [`AppUtilError::Json`], [`AppUtilError::Csv`]
//!
//! Library code propagates errors as [`anyhow::Error`]; typed errors are
//! recovered at the CLI boundary with [`user_friendly_error`], which attaches
//! suggestions and renders them with terminal colours.
//!
//! # Examples
//!
//! ```rust,no_run
//! use biominer_app_util::core::{AppUtilError, user_friendly_error};
//!
//! let error = AppUtilError::DirectoryConflict {
//!     path: "projects/demo/S1".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::constants::{EXIT_APP_INSTALL_FAILED, EXIT_APP_IS_INSTALLED, EXIT_FAILURE, EXIT_JSON_NOT_VALID};

/// The main error type for app-utility operations.
///
/// Each variant carries the context needed to diagnose the failure without
/// re-reading logs: the app or file involved and, where available, the
/// position of the problem.
#[derive(Error, Debug)]
pub enum AppUtilError {
    /// App directory is missing one of its required members
    #[error("{name} is not a valid app: missing {missing}")]
    InvalidApp {
        /// Name (or path) of the app
        name: String,
        /// The required member that was not found
        missing: String,
    },

    /// App is not installed under the app root
    #[error("No such app: {name}")]
    AppNotFound {
        /// Name of the app that could not be found
        name: String,
    },

    /// App is already installed and `--force` was not given
    #[error("{name} is installed. If you want to reinstall, you can specify a --force flag.")]
    AppAlreadyInstalled {
        /// Name of the installed app
        name: String,
    },

    /// Installing an app failed
    #[error("Install {name} unsuccessfully: {reason}")]
    InstallFailed {
        /// Name of the app being installed
        name: String,
        /// Why the installation failed
        reason: String,
    },

    /// Removing an app failed
    #[error("Uninstall {name} unsuccessfully: {reason}")]
    UninstallFailed {
        /// Name of the app being removed
        name: String,
        /// Why the removal failed
        reason: String,
    },

    /// A git subprocess failed
    #[error("Git operation failed: {operation}")]
    GitCommandFailed {
        /// The git subcommand that failed
        operation: String,
        /// Error output from git
        stderr: String,
    },

    /// Template could not be parsed
    #[error("Template syntax error in {template}: {message}")]
    TemplateSyntax {
        /// Template file name or path
        template: String,
        /// Parser message
        message: String,
        /// Line number reported by the parser, if any
        line: Option<usize>,
    },

    /// Template referenced a variable missing from the render context
    #[error("Undefined variable '{variable}' in template {template}")]
    UndefinedVariable {
        /// Template file name or path
        template: String,
        /// The variable that was not found
        variable: String,
        /// Close matches among the variables that were defined
        suggestions: Vec<String>,
    },

    /// Samples file is unusable for the whole batch
    #[error("Malformed samples file {file}: {reason}")]
    MalformedInput {
        /// Samples file path
        file: String,
        /// What is wrong with it
        reason: String,
    },

    /// Output directory already exists and overwriting was not requested
    #[error("{path} exists")]
    DirectoryConflict {
        /// The conflicting directory
        path: String,
    },

    /// Rendered inputs document is not well-formed JSON
    #[error("Invalid JSON in rendered {file}: {message}: line {line} column {column}")]
    InvalidRenderedOutput {
        /// Which rendered document failed
        file: String,
        /// Parser message without position
        message: String,
        /// 1-based line of the offending character
        line: usize,
        /// 1-based column of the offending character
        column: usize,
        /// Offending line followed by a caret marker line
        snippet: String,
    },

    /// Dependency archive could not be built
    #[error("Failed to build dependency archive: {reason}")]
    ArchiveBuild {
        /// Archiver failure description
        reason: String,
    },

    /// One or more samples of a render batch failed
    #[error("{failed} of {total} samples failed to render")]
    SamplesFailed {
        /// Number of failed samples
        failed: usize,
        /// Number of samples in the batch
        total: usize,
        /// Whether any failure was an invalid rendered JSON document
        invalid_json: bool,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl AppUtilError {
    /// Process exit code the CLI uses for this error.
    ///
    /// Invalid rendered JSON, an already-installed app, and an install failure
    /// each map to a distinct code; everything else exits with 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::AppAlreadyInstalled {
                ..
            } => EXIT_APP_IS_INSTALLED,
            Self::InstallFailed {
                ..
            } => EXIT_APP_INSTALL_FAILED,
            Self::InvalidRenderedOutput {
                ..
            } => EXIT_JSON_NOT_VALID,
            Self::SamplesFailed {
                invalid_json: true,
                ..
            } => EXIT_JSON_NOT_VALID,
            _ => EXIT_FAILURE,
        }
    }
}

impl Clone for AppUtilError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidApp {
                name,
                missing,
            } => Self::InvalidApp {
                name: name.clone(),
                missing: missing.clone(),
            },
            Self::AppNotFound {
                name,
            } => Self::AppNotFound {
                name: name.clone(),
            },
            Self::AppAlreadyInstalled {
                name,
            } => Self::AppAlreadyInstalled {
                name: name.clone(),
            },
            Self::InstallFailed {
                name,
                reason,
            } => Self::InstallFailed {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::UninstallFailed {
                name,
                reason,
            } => Self::UninstallFailed {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::GitCommandFailed {
                operation,
                stderr,
            } => Self::GitCommandFailed {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::TemplateSyntax {
                template,
                message,
                line,
            } => Self::TemplateSyntax {
                template: template.clone(),
                message: message.clone(),
                line: *line,
            },
            Self::UndefinedVariable {
                template,
                variable,
                suggestions,
            } => Self::UndefinedVariable {
                template: template.clone(),
                variable: variable.clone(),
                suggestions: suggestions.clone(),
            },
            Self::MalformedInput {
                file,
                reason,
            } => Self::MalformedInput {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::DirectoryConflict {
                path,
            } => Self::DirectoryConflict {
                path: path.clone(),
            },
            Self::InvalidRenderedOutput {
                file,
                message,
                line,
                column,
                snippet,
            } => Self::InvalidRenderedOutput {
                file: file.clone(),
                message: message.clone(),
                line: *line,
                column: *column,
                snippet: snippet.clone(),
            },
            Self::ArchiveBuild {
                reason,
            } => Self::ArchiveBuild {
                reason: reason.clone(),
            },
            Self::SamplesFailed {
                failed,
                total,
                invalid_json,
            } => Self::SamplesFailed {
                failed: *failed,
                total: *total,
                invalid_json: *invalid_json,
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::Io(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Json(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::Csv(e) => Self::Other {
                message: format!("CSV error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// When displayed, errors show:
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context about the error in yellow (optional)
/// 3. **Suggestion**: Actionable steps to resolve the issue in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: AppUtilError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: AppUtilError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Exit code for an arbitrary error chain.
///
/// Looks for an [`AppUtilError`] anywhere in the chain so that context added
/// with `anyhow::Context` does not hide the distinct exit codes.
#[must_use]
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AppUtilError>())
        .map_or(EXIT_FAILURE, AppUtilError::exit_code)
}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`AppUtilError`] anywhere in the chain, [`std::io::Error`] kinds,
/// and falls back to printing the full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let app_error = error.chain().find_map(|cause| cause.downcast_ref::<AppUtilError>());
    let io_error = match app_error {
        Some(AppUtilError::Io(e)) => Some(e),
        Some(_) => None,
        None => error.downcast_ref::<std::io::Error>(),
    };

    if let Some(io_error) = io_error {
        let outer = (!error.is::<std::io::Error>()).then(|| error.to_string());
        let ctx = match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => Some(
                ErrorContext::new(AppUtilError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions of the app and work directories"),
            ),
            std::io::ErrorKind::NotFound => Some(
                ErrorContext::new(AppUtilError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct"),
            ),
            _ => None,
        };
        if let Some(mut ctx) = ctx {
            ctx.details = outer;
            return ctx;
        }
    }

    if let Some(app_error) = app_error {
        let mut ctx = create_error_context(app_error.clone());
        // Keep the outer context message when the typed error sits deeper in the chain
        if !error.is::<AppUtilError>() && ctx.details.is_none() {
            ctx.details = Some(error.to_string());
        }
        return ctx;
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(AppUtilError::Other {
        message,
    })
}

fn create_error_context(error: AppUtilError) -> ErrorContext {
    match &error {
        AppUtilError::InvalidApp {
            missing,
            ..
        } => {
            let details = format!("An app needs inputs, workflow.wdl and tasks/; {missing} was not found");
            ErrorContext::new(error.clone())
                .with_suggestion("Reinstall the app or check the --base-dir option")
                .with_details(details)
        }

        AppUtilError::AppNotFound {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Run 'app-utility apps' to list the installed apps"),

        AppUtilError::GitCommandFailed {
            stderr,
            ..
        } => {
            let details = stderr.trim().to_string();
            ErrorContext::new(error.clone())
                .with_details(details)
                .with_suggestion("Check the app name, version, credentials and the --endpoint option")
        }

        AppUtilError::TemplateSyntax {
            line,
            ..
        } => {
            let details = match line {
                Some(line) => format!("The parser stopped at line {line}"),
                None => "The template could not be parsed".to_string(),
            };
            ErrorContext::new(error.clone())
                .with_suggestion(
                    "Check template syntax: variables use {{ var }}, comments use {# #}, control flow uses {% %}",
                )
                .with_details(details)
        }

        AppUtilError::UndefinedVariable {
            variable,
            suggestions,
            ..
        } => {
            let suggestion = if suggestions.is_empty() {
                format!("Add a '{variable}' column to the samples file or a default value to the app")
            } else {
                format!("Did you mean {}?", suggestions.join(", "))
            };
            ErrorContext::new(error.clone())
                .with_suggestion(suggestion)
                .with_details("Undefined template variables are rejected instead of rendering as blank")
        }

        AppUtilError::MalformedInput {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Every record needs a sample_id and every CSV header cell needs a name"),

        AppUtilError::DirectoryConflict {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Choose another project name or pass --force to overwrite"),

        AppUtilError::InvalidRenderedOutput {
            snippet,
            ..
        } => {
            let details = snippet.clone();
            ErrorContext::new(error.clone())
                .with_details(details)
                .with_suggestion("Fix the inputs template or the sample values it interpolates")
        }

        AppUtilError::ArchiveBuild {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Install the 'zip' command or check the permissions of the temp directory"),

        AppUtilError::SamplesFailed {
            ..
        } => ErrorContext::new(error.clone())
            .with_details("See the log above for the failing sample and step"),

        _ => ErrorContext::new(error.clone()),
    }
}
