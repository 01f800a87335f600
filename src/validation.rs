//! Well-formedness checks for rendered documents.

use crate::core::AppUtilError;

/// Check that `text`, the rendered document `file`, is valid JSON.
///
/// # Errors
///
/// [`AppUtilError::InvalidRenderedOutput`] with the 1-based line and column of
/// the offending character and a snippet showing that line with a caret under
/// the column:
///
/// ```text
/// {"id": "S1",}
///             ^-- trailing comma
/// ```
pub fn check_json(file: &str, text: &str) -> Result<(), AppUtilError> {
    let Err(error) = serde_json::from_str::<serde_json::Value>(text) else {
        return Ok(());
    };

    let line = error.line();
    let column = error.column();
    let message = strip_position(&error.to_string());
    let snippet = caret_snippet(text, line, column, &message);

    tracing::error!("Invalid JSON: {}", file);

    Err(AppUtilError::InvalidRenderedOutput {
        file: file.to_string(),
        message,
        line,
        column,
        snippet,
    })
}

/// serde_json appends " at line L column C" to its messages.
fn strip_position(message: &str) -> String {
    message.rsplit_once(" at line ").map_or(message, |(head, _)| head).to_string()
}

fn caret_snippet(text: &str, line: usize, column: usize, message: &str) -> String {
    let source_line = text.lines().nth(line.saturating_sub(1)).unwrap_or_default();
    format!("{source_line}\n{}^-- {message}", " ".repeat(column.saturating_sub(1)))
}
