//! Structured error records.
//!
//! Every failure that reaches a script or a host is an [`ErrorRecord`]. The
//! `terminating` flag decides whether it aborts the enclosing pipeline or is
//! written to the error stream while processing continues.

use serde::Serialize;

use crate::value::Value;

/// Broad classification of an error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCategory {
    LexError,
    ParseError,
    InvalidCast,
    IncompatibleTypes,
    DivideByZero,
    CommandNotFound,
    Runtime,
    PipelineStopped,
    ExternalProcess,
    Host,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::LexError => "LexError",
            ErrorCategory::ParseError => "ParseError",
            ErrorCategory::InvalidCast => "InvalidCast",
            ErrorCategory::IncompatibleTypes => "IncompatibleTypes",
            ErrorCategory::DivideByZero => "DivideByZero",
            ErrorCategory::CommandNotFound => "CommandNotFound",
            ErrorCategory::Runtime => "Runtime",
            ErrorCategory::PipelineStopped => "PipelineStopped",
            ErrorCategory::ExternalProcess => "ExternalProcess",
            ErrorCategory::Host => "Host",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error raised during evaluation or by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub message: String,
    /// What the error is about: a command name, an operator, a variable.
    pub target: Option<String>,
    /// Terminating errors abort the pipeline they are raised in.
    pub terminating: bool,
}

impl ErrorRecord {
    /// Create a non-terminating error record.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            target: None,
            terminating: false,
        }
    }

    /// Create a terminating runtime error, as raised by `throw`.
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Runtime, message).terminating()
    }

    pub fn command_not_found(name: &str) -> Self {
        Self::new(
            ErrorCategory::CommandNotFound,
            format!(
                "The term '{}' is not recognized as the name of a function, builtin, or program",
                name
            ),
        )
        .with_target(name)
    }

    pub fn stopped() -> Self {
        Self::new(ErrorCategory::PipelineStopped, "The pipeline has been stopped").terminating()
    }

    /// Mark this record terminating.
    pub fn terminating(mut self) -> Self {
        self.terminating = true;
        self
    }

    /// Clear the terminating flag.
    pub fn non_terminating(mut self) -> Self {
        self.terminating = false;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The record as a script-visible value: the message text with
    /// `Category`, `Message`, `TargetObject` and `Terminating` properties.
    pub fn to_value(&self) -> Value {
        let mut value = Value::from(self.message.as_str());
        value.set_property("Category", Value::from(self.category.as_str()));
        value.set_property("Message", Value::from(self.message.as_str()));
        value.set_property(
            "TargetObject",
            self.target.as_deref().map(Value::from).unwrap_or_default(),
        );
        value.set_property("Terminating", Value::from(self.terminating));
        value
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}: {}", target, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ErrorRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_target() {
        let record = ErrorRecord::command_not_found("Get-Nothing");
        assert!(record.to_string().starts_with("Get-Nothing: The term 'Get-Nothing'"));
        assert!(!record.terminating);
    }

    #[test]
    fn thrown_records_are_terminating() {
        let record = ErrorRecord::thrown("boom");
        assert!(record.terminating);
        assert_eq!(record.category, ErrorCategory::Runtime);
        assert!(!record.clone().non_terminating().terminating);
    }

    #[test]
    fn record_value_carries_properties() {
        let value = ErrorRecord::thrown("boom").to_value();
        assert_eq!(value.to_string(), "boom");
        assert_eq!(
            value.property("category").map(|v| v.to_string()),
            Some("Runtime".to_string())
        );
        assert_eq!(value.property("Terminating"), Some(&Value::from(true)));
    }
}
