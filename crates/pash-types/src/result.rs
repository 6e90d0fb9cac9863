//! PipelineResult: what a host gets back from running a script.

use serde::Serialize;

use crate::error::ErrorRecord;
use crate::value::Value;

/// Lifecycle of one pipeline invocation.
///
/// ```text
/// Created ──► Running ──┬──► Completed
///                       ├──► Failed
///                       └──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl PipelineState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_become(self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Created, PipelineState::Running)
                | (PipelineState::Created, PipelineState::Stopped)
                | (PipelineState::Running, PipelineState::Completed)
                | (PipelineState::Running, PipelineState::Failed)
                | (PipelineState::Running, PipelineState::Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Failed | PipelineState::Stopped
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Created => "Created",
            PipelineState::Running => "Running",
            PipelineState::Completed => "Completed",
            PipelineState::Failed => "Failed",
            PipelineState::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// The outcome of a top-level pipeline run.
///
/// - completed: `state == Completed`, `errors` empty
/// - partial success: `state == Completed`, `errors` non-empty
/// - failure: `state == Failed`, `failure` holds the terminating record
/// - cancelled: `state == Stopped`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub state: PipelineState,
    /// Values that reached the success stream, in emission order.
    pub output: Vec<Value>,
    /// Non-terminating error records, drained from the error stream.
    pub errors: Vec<ErrorRecord>,
    /// The terminating error that failed the pipeline.
    pub failure: Option<ErrorRecord>,
}

impl PipelineResult {
    pub fn completed(output: Vec<Value>, errors: Vec<ErrorRecord>) -> Self {
        Self {
            state: PipelineState::Completed,
            output,
            errors,
            failure: None,
        }
    }

    pub fn failed(output: Vec<Value>, errors: Vec<ErrorRecord>, failure: ErrorRecord) -> Self {
        Self {
            state: PipelineState::Failed,
            output,
            errors,
            failure: Some(failure),
        }
    }

    pub fn stopped(output: Vec<Value>, errors: Vec<ErrorRecord>) -> Self {
        Self {
            state: PipelineState::Stopped,
            output,
            errors,
            failure: None,
        }
    }

    /// True when the pipeline completed without writing any error record.
    pub fn ok(&self) -> bool {
        self.state == PipelineState::Completed && self.errors.is_empty()
    }

    /// Output values rendered as text, one per entry.
    pub fn output_strings(&self) -> Vec<String> {
        self.output.iter().map(|v| v.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_only_moves_forward() {
        assert!(PipelineState::Created.can_become(PipelineState::Running));
        assert!(PipelineState::Running.can_become(PipelineState::Failed));
        assert!(!PipelineState::Completed.can_become(PipelineState::Running));
        assert!(!PipelineState::Created.can_become(PipelineState::Completed));
        assert!(PipelineState::Stopped.is_terminal());
        assert!(!PipelineState::Running.is_terminal());
    }

    #[test]
    fn partial_success_is_not_ok() {
        let result = PipelineResult::completed(
            vec![Value::from(1)],
            vec![ErrorRecord::new(crate::ErrorCategory::Runtime, "bad input")],
        );
        assert_eq!(result.state, PipelineState::Completed);
        assert!(!result.ok());
        assert_eq!(result.output_strings(), vec!["1"]);
    }
}
