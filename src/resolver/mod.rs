//! Variable resolution: layering defaults, sample data, and the project name.
//!
//! Precedence, highest first:
//!
//! 1. `project_name`, always taken from the render run
//! 2. values from the sample record
//! 3. app defaults
//!
//! The pre-flight helpers ([`get_all_variables`], [`check_variables`]) use the
//! same rules to report what a samples file still has to provide.

use anyhow::Result;
use serde_json::Value;

use crate::constants::{INPUTS_FILE, PROJECT_NAME_KEY, SAMPLE_ID_KEY, WORKFLOW_FILE};
use crate::core::App;
use crate::defaults::DefaultVariables;
use crate::samples::SampleRecord;
use crate::templating::{VariableSet, extract_variables};

/// Build the render context for one sample.
///
/// Every default missing from `sample` is added; values already in `sample`
/// are kept. `project_name` is then overwritten unconditionally.
#[must_use]
pub fn resolve(mut sample: SampleRecord, defaults: &DefaultVariables, project_name: &str) -> SampleRecord {
    for (key, value) in defaults.vars() {
        if !sample.contains_key(key) {
            sample.insert(key.clone(), value.clone());
        }
    }

    if let Some(previous) = sample.insert(PROJECT_NAME_KEY, Value::String(project_name.to_string())) {
        if previous.as_str() != Some(project_name) {
            tracing::debug!(
                "Sample {:?} overrides project_name {} with {}",
                sample.sample_id(),
                previous,
                project_name
            );
        }
    }

    sample
}

/// Every variable a samples file must provide for `app`.
///
/// The union of the inputs and workflow template variables, always including
/// `sample_id` and never `project_name`. With `exclude_defaults`, variables
/// the app defaults already cover are left out.
pub fn get_all_variables(app: &App, exclude_defaults: bool) -> Result<VariableSet> {
    let mut variables = extract_variables(&app.inputs_path())?;
    variables.extend(extract_variables(&app.workflow_path())?);
    variables.insert(SAMPLE_ID_KEY.to_string());
    variables.remove(PROJECT_NAME_KEY);

    if exclude_defaults {
        let defaults = DefaultVariables::load(app.root())?;
        variables = defaults.diff(variables);
    }

    Ok(variables)
}

/// What a pre-flight check compares template variables against.
#[derive(Debug, Clone, Copy)]
pub enum VariableSource<'a> {
    /// One sample record
    Row(&'a SampleRecord),
    /// Column names of a samples file
    Header(&'a [String]),
}

impl VariableSource<'_> {
    fn provides(&self, variable: &str) -> bool {
        match self {
            Self::Row(record) => record.contains_key(variable),
            Self::Header(header) => header.iter().any(|h| h == variable),
        }
    }
}

/// Check that `against` provides every variable of one template.
///
/// `sample_id` is always required and `project_name` never is. Returns
/// `false` after logging a warning for the first missing variable.
///
/// # Errors
///
/// Fails only when the template cannot be read or parsed, or the defaults
/// file is unreadable.
pub fn check_variables(
    app: &App,
    template_file: &str,
    against: VariableSource<'_>,
    exclude_defaults: bool,
) -> Result<bool> {
    let mut variables = extract_variables(&app.template_path(template_file))?;
    variables.insert(SAMPLE_ID_KEY.to_string());

    if exclude_defaults {
        let defaults = DefaultVariables::load(app.root())?;
        variables = defaults.diff(variables);
    }

    for variable in variables.iter().filter(|v| v.as_str() != PROJECT_NAME_KEY) {
        if !against.provides(variable) {
            tracing::warn!("{} not in samples header.", variable);
            return Ok(false);
        }
    }

    Ok(true)
}

/// Run [`check_variables`] for both templates of `app`.
pub fn check_app_variables(app: &App, against: VariableSource<'_>, exclude_defaults: bool) -> Result<bool> {
    for template in [INPUTS_FILE, WORKFLOW_FILE] {
        if !check_variables(app, template, against, exclude_defaults)? {
            return Ok(false);
        }
    }
    Ok(true)
}
