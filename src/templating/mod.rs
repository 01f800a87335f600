//! Template analysis and rendering with Tera.
//!
//! App templates (`inputs` and `workflow.wdl`) use Jinja-style syntax:
//!
//! ```text
//! {
//!   "{{ workflow_name }}.fastq_1": "{{ read1 }}",
//!   "{{ workflow_name }}.sample_id": "{{ sample_id }}",
//!   "{{ workflow_name }}.cpu": {{ threads | default(value=4) }}
//! }
//! ```
//!
//! Two operations are provided:
//! - [`extractor`] walks the parsed syntax tree, without rendering, and
//!   collects the free variables a template needs
//! - [`renderer`] substitutes a resolved variable context into a template
//!
//! Rendering is strict: a variable that is referenced but missing from the
//! context fails with [`crate::core::AppUtilError::UndefinedVariable`] instead
//! of rendering as an empty string.

pub mod extractor;
pub mod renderer;

pub use extractor::{VariableSet, extract_variables, extract_variables_from_str};
pub use renderer::{TemplateRenderer, render};

use regex::Regex;

use crate::core::AppUtilError;

/// Build a [`AppUtilError::TemplateSyntax`] from a Tera parse error.
pub(crate) fn syntax_error(template: &str, error: &tera::Error) -> AppUtilError {
    AppUtilError::TemplateSyntax {
        template: template.to_string(),
        message: format_tera_error(error),
        line: extract_line_from_tera_error(error),
    }
}

/// Flatten a Tera error chain into one readable message.
///
/// Tera wraps the useful message ("Variable `x` not found", a pest parse
/// error) in generic "Failed to render/parse" layers; those layers are
/// dropped.
pub(crate) fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = Vec::new();
    let mut current: Option<&dyn Error> = Some(error);
    while let Some(err) = current {
        let msg = err.to_string();
        let trimmed = msg.trim();
        if !trimmed.is_empty()
            && !trimmed.starts_with("Failed to render")
            && !trimmed.starts_with("Failed to parse")
        {
            messages.push(trimmed.to_string());
        }
        current = err.source();
    }

    if messages.is_empty() {
        error.to_string()
    } else {
        messages.join("\n  → ")
    }
}

/// Line number from a Tera parse error, which reports positions as `--> line:col`.
fn extract_line_from_tera_error(error: &tera::Error) -> Option<usize> {
    let text = format_tera_error(error);
    let re = Regex::new(r"-->\s*(\d+):(\d+)").ok()?;
    re.captures(&text)?.get(1)?.as_str().parse().ok()
}
