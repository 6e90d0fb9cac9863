//! Execution context for builtins.

use pash_types::{ErrorRecord, ScriptBlockRef, Value};

use crate::interpreter::{EvalResult, Evaluator};
use crate::scheduler::{collapse, Streams};

/// What a builtin phase can reach: the evaluator it runs under and the
/// streams of its pipeline stage.
pub struct ExecContext<'a> {
    pub evaluator: &'a mut Evaluator,
    pub streams: &'a mut Streams,
}

impl<'a> ExecContext<'a> {
    pub fn new(evaluator: &'a mut Evaluator, streams: &'a mut Streams) -> Self {
        Self { evaluator, streams }
    }

    /// Emit one value as is.
    pub async fn emit(&mut self, value: Value) -> EvalResult<()> {
        let cancel = self.evaluator.cancel_token().clone();
        self.streams.output.emit(value, &cancel).await
    }

    /// Emit a value, unrolling a sequence one level.
    pub async fn write(&mut self, value: Value) -> EvalResult<()> {
        let cancel = self.evaluator.cancel_token().clone();
        self.streams.output.write(value, &cancel).await
    }

    /// Report a non-terminating error and carry on.
    pub fn error(&self, record: ErrorRecord) {
        self.streams.errors.write(record);
    }

    /// Run a script block in the caller's scope with `$_` bound, output to
    /// this stage's stream.
    pub async fn invoke(&mut self, block: &ScriptBlockRef, dollar_under: Value) -> EvalResult<()> {
        self.evaluator
            .invoke_script_block(block, Some(dollar_under), Vec::new(), false, self.streams)
            .await
    }

    /// Like [`invoke`](Self::invoke), but collect the output into one value.
    pub async fn invoke_value(&mut self, block: &ScriptBlockRef, dollar_under: Value) -> EvalResult<Value> {
        let mut collected = Streams::collecting(&self.streams.errors);
        self.evaluator
            .invoke_script_block(block, Some(dollar_under), Vec::new(), false, &mut collected)
            .await?;
        Ok(collapse(collected.output.take_collected()))
    }
}
