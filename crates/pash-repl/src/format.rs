//! Output formatting for the REPL.
//!
//! This module turns a [`PipelineResult`] into text for the user:
//!
//! - **Text** → values rendered the way `Out-String` renders them, then
//!   error records, one per line
//! - **Json** → the whole result as pretty JSON, for tooling and models
//!
//! Error records are colored only when stdout is a terminal.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use pash_kernel::format::render_lines;
use pash_kernel::{describe_record, ErrorRecord, PipelineResult, PipelineState};

/// Where the output is going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContext {
    /// A human at a terminal.
    Interactive,
    /// A pipe or file.
    Piped,
}

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

/// Detect the output context based on terminal state.
pub fn detect_context() -> OutputContext {
    if std::io::stdout().is_terminal() {
        OutputContext::Interactive
    } else {
        OutputContext::Piped
    }
}

/// Format a result for display.
pub fn format_result(result: &PipelineResult, mode: OutputMode, context: OutputContext) -> Result<String> {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(result).context("Failed to serialize result"),
        OutputMode::Text => Ok(format_text(result, context)),
    }
}

fn format_text(result: &PipelineResult, context: OutputContext) -> String {
    let mut lines = render_lines(&result.output);
    lines.extend(result.errors.iter().map(|record| format_record(record, context)));
    if let Some(failure) = &result.failure {
        lines.push(format_record(failure, context));
    }
    if result.state == PipelineState::Stopped {
        lines.push("(stopped)".to_string());
    }
    lines.join("\n")
}

/// One error record, red at a terminal.
pub fn format_record(record: &ErrorRecord, context: OutputContext) -> String {
    let text = describe_record(record);
    match context {
        OutputContext::Interactive => format!("\x1b[31m{}\x1b[0m", text),
        OutputContext::Piped => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pash_kernel::{ErrorCategory, Value};

    #[test]
    fn values_then_errors() {
        let result = PipelineResult::completed(
            vec![Value::from(1), Value::from("two")],
            vec![ErrorRecord::new(ErrorCategory::DivideByZero, "attempted to divide by zero")],
        );
        let text = format_result(&result, OutputMode::Text, OutputContext::Piped).unwrap();
        assert_eq!(text, "1\ntwo\nDivideByZero: attempted to divide by zero");
    }

    #[test]
    fn failures_and_stops_are_reported() {
        let failed = PipelineResult::failed(vec![], vec![], ErrorRecord::thrown("boom"));
        let text = format_result(&failed, OutputMode::Text, OutputContext::Piped).unwrap();
        assert!(text.ends_with("boom"), "{}", text);

        let stopped = PipelineResult::stopped(vec![Value::from(1)], vec![]);
        let text = format_result(&stopped, OutputMode::Text, OutputContext::Piped).unwrap();
        assert_eq!(text, "1\n(stopped)");
    }

    #[test]
    fn interactive_errors_are_colored() {
        let record = ErrorRecord::new(ErrorCategory::Runtime, "oops");
        let text = format_record(&record, OutputContext::Interactive);
        assert!(text.starts_with("\x1b[31m"));
        assert!(text.contains("Runtime: oops"));
    }

    #[test]
    fn json_mode_serializes_everything() {
        let result = PipelineResult::completed(vec![Value::from(42)], vec![]);
        let json = format_result(&result, OutputMode::Json, OutputContext::Piped).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["state"], "Completed");
        assert_eq!(parsed["output"][0], 42);
    }
}
