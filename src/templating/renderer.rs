//! Rendering app templates against a resolved variable context.

use anyhow::{Context as _, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use tera::{Context, Tera};

use super::{format_tera_error, syntax_error};
use crate::constants::{INPUTS_FILE, WORKFLOW_FILE};
use crate::core::{App, AppUtilError};

/// Maximum edit distance for "did you mean" suggestions.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Renderer holding the parsed templates of one app.
///
/// Templates are parsed once and shared, so a batch of samples does not
/// re-read or re-parse them. `Tera` is `Send + Sync`; wrap the renderer in an
/// `Arc` to share it between workers.
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Parse the `inputs` and `workflow.wdl` templates of `app`.
    ///
    /// # Errors
    ///
    /// Fails if either template cannot be read, or with
    /// [`AppUtilError::TemplateSyntax`] if either does not parse.
    pub fn for_app(app: &App) -> Result<Self> {
        let mut renderer = Self::empty();
        for file in [INPUTS_FILE, WORKFLOW_FILE] {
            let path = app.template_path(file);
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {}", path.display()))?;
            renderer.add_template(file, &source)?;
        }
        Ok(renderer)
    }

    /// A renderer with no templates.
    #[must_use]
    pub fn empty() -> Self {
        let mut tera = Tera::default();
        // Templates produce JSON and WDL, never HTML
        tera.autoescape_on(vec![]);
        Self {
            tera,
        }
    }

    /// Register template `source` under `name`.
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.tera.add_raw_template(name, source).map_err(|e| syntax_error(name, &e))?;
        Ok(())
    }

    /// Render the template registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppUtilError::UndefinedVariable`] when the template reads a
    /// variable missing from `context`, and [`AppUtilError::TemplateSyntax`]
    /// for any other rendering failure.
    pub fn render<C: Serialize>(&self, name: &str, context: &C) -> Result<String> {
        let context = Context::from_serialize(context)
            .with_context(|| format!("Variable context for {name} is not a map"))?;

        self.tera.render(name, &context).map_err(|e| render_error(name, &e, &context).into())
    }
}

/// Render one template file of `app` with `context`.
///
/// Convenience for single renders; batch rendering goes through a shared
/// [`TemplateRenderer`].
pub fn render<C: Serialize>(app: &App, template_file: &str, context: &C) -> Result<String> {
    let path = app.template_path(template_file);
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read template: {}", path.display()))?;

    let mut renderer = TemplateRenderer::empty();
    renderer.add_template(template_file, &source)?;
    renderer.render(template_file, context)
}

fn render_error(template: &str, error: &tera::Error, context: &Context) -> AppUtilError {
    let message = format_tera_error(error);

    if let Some(path) = undefined_variable(&message) {
        let (variable, suggestions) = describe_missing(path, &context.clone().into_json());
        return AppUtilError::UndefinedVariable {
            template: template.to_string(),
            suggestions,
            variable,
        };
    }

    tracing::debug!("Render of {} failed: {}", template, message);
    syntax_error(template, error)
}

/// Path of the missing variable in Tera's "Variable `x` not found" message.
fn undefined_variable(message: &str) -> Option<&str> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"Variable `([^`]+)` not found").ok()).as_ref()?;
    Some(re.captures(message)?.get(1)?.as_str())
}

/// The variable to report for a missing `path`, with similar names.
///
/// A missing root (`sampel` in `sampel.reads`) is reported alone and matched
/// against the context keys. When the root exists the full path is reported,
/// and for dotted paths the last segment is matched against the keys of the
/// object holding it.
fn describe_missing(path: &str, context: &Value) -> (String, Vec<String>) {
    let root = path.split(['.', '[']).next().unwrap_or(path);
    let Some(root_value) = context.get(root) else {
        return (root.to_string(), find_similar(root, &object_keys(context)));
    };

    let suggestions = match path.rsplit_once('.') {
        Some((parent, last)) if !path.contains('[') => {
            let holder = parent.split('.').skip(1).try_fold(root_value, |value, key| value.get(key));
            holder
                .map(|holder| {
                    find_similar(last, &object_keys(holder))
                        .into_iter()
                        .map(|key| format!("{parent}.{key}"))
                        .collect()
                })
                .unwrap_or_default()
        }
        _ => Vec::new(),
    };
    (path.to_string(), suggestions)
}

fn object_keys(value: &Value) -> Vec<String> {
    value.as_object().map(|map| map.keys().cloned().collect()).unwrap_or_default()
}

/// Context keys within a small edit distance of `name`, closest first.
fn find_similar(name: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<(usize, &String)> = available
        .iter()
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .collect();
    scored.sort();
    scored.into_iter().take(3).map(|(_, candidate)| candidate.clone()).collect()
}
