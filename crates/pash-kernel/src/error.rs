//! Kernel-level errors.

use pash_types::{ErrorCategory, ErrorRecord};
use thiserror::Error;

use crate::ops::OperatorError;
use crate::parser::ParseError;

/// Errors surfaced by the kernel API.
///
/// Script-level failures travel as [`ErrorRecord`]s inside a
/// [`PipelineResult`](pash_types::PipelineResult); only source that cannot
/// run at all, or an API call that fails outright, becomes a `KernelError`.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("lex error at {line}:{column}: {message}")]
    Lex {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("{0}")]
    Runtime(ErrorRecord),

    #[error("the pipeline has been stopped")]
    PipelineStopped,
}

impl KernelError {
    /// The first of a batch of parse errors, with its position in `source`.
    pub fn from_parse_errors(source: &str, errors: &[ParseError]) -> Self {
        let Some(first) = errors.first() else {
            return KernelError::Parse {
                line: 1,
                column: 1,
                message: "invalid input".to_string(),
            };
        };
        let (line, column) = first.line_col(source);
        let message = first.message.clone();
        if first.lexical {
            KernelError::Lex { line, column, message }
        } else {
            KernelError::Parse { line, column, message }
        }
    }

    /// The error as a record, for callers that report everything that way.
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            KernelError::Lex { .. } => ErrorRecord::new(ErrorCategory::LexError, self.to_string()).terminating(),
            KernelError::Parse { .. } => {
                ErrorRecord::new(ErrorCategory::ParseError, self.to_string()).terminating()
            }
            KernelError::Operator(err) => err.to_record(),
            KernelError::CommandNotFound(name) => ErrorRecord::command_not_found(name),
            KernelError::Runtime(record) => record.clone(),
            KernelError::PipelineStopped => ErrorRecord::stopped(),
        }
    }
}

impl From<ErrorRecord> for KernelError {
    fn from(record: ErrorRecord) -> Self {
        match record.category {
            ErrorCategory::CommandNotFound => {
                KernelError::CommandNotFound(record.target.clone().unwrap_or(record.message))
            }
            ErrorCategory::PipelineStopped => KernelError::PipelineStopped,
            _ => KernelError::Runtime(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn parse_errors_carry_positions() {
        let source = "1 +\n(2";
        let errors = parse(source).unwrap_err();
        match KernelError::from_parse_errors(source, &errors) {
            KernelError::Parse { line, .. } | KernelError::Lex { line, .. } => assert!(line >= 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn records_round_trip_by_category() {
        let err = KernelError::from(ErrorRecord::command_not_found("Get-Nothing"));
        assert!(matches!(err, KernelError::CommandNotFound(ref n) if n == "Get-Nothing"));
        assert_eq!(err.to_record().category, ErrorCategory::CommandNotFound);
    }
}
