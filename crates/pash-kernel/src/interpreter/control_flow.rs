//! Control flow outcomes.
//!
//! Statements return a [`Flow`] describing where execution goes next.
//! Everything that unwinds past statement boundaries without being a
//! normal outcome is a [`Fail`].

use pash_types::ErrorRecord;

/// How a statement or block finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    /// `return`: leaves the current function phase or script block.
    Return,
}

/// Why evaluation unwound.
#[derive(Debug, Clone, PartialEq)]
pub enum Fail {
    /// An error record on its way to a `catch`, the statement boundary or
    /// the pipeline boundary.
    Error(ErrorRecord),
    /// The cancellation token fired.
    Stopped,
    /// Nobody reads this stage's output any more.
    OutputClosed,
}

impl Fail {
    /// The record a caller should report for this failure.
    pub fn into_record(self) -> ErrorRecord {
        match self {
            Fail::Error(record) => record,
            Fail::Stopped | Fail::OutputClosed => ErrorRecord::stopped(),
        }
    }
}

impl From<ErrorRecord> for Fail {
    fn from(record: ErrorRecord) -> Self {
        Fail::Error(record)
    }
}

impl From<crate::ops::OperatorError> for Fail {
    fn from(err: crate::ops::OperatorError) -> Self {
        Fail::Error(err.to_record())
    }
}

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, Fail>;
