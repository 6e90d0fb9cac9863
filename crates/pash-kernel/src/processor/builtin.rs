//! Native builtins as pipeline stages.

use std::sync::Arc;

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, Value};

use crate::interpreter::{EvalResult, Evaluator};
use crate::scheduler::Streams;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, ExecContext};

use super::{CommandArg, Lifecycle};

/// Binds arguments against the builtin's schema during `prepare`, then
/// hands every phase to the instance it created.
///
/// The evaluator shares the caller's frames: script blocks given to
/// `ForEach-Object` and `Where-Object` see and assign the caller's
/// variables.
pub struct BuiltinProcessor {
    builtin: Arc<dyn Builtin>,
    args: Option<Vec<CommandArg>>,
    instance: Option<Box<dyn BuiltinInstance>>,
    evaluator: Evaluator,
}

impl BuiltinProcessor {
    pub fn new(builtin: Arc<dyn Builtin>, args: Vec<CommandArg>, evaluator: Evaluator) -> Self {
        Self {
            builtin,
            args: Some(args),
            instance: None,
            evaluator,
        }
    }

    pub fn name(&self) -> &str {
        self.builtin.name()
    }

    fn parts(&mut self) -> EvalResult<(&mut Box<dyn BuiltinInstance>, &mut Evaluator)> {
        match self.instance.as_mut() {
            Some(instance) => Ok((instance, &mut self.evaluator)),
            None => Err(ErrorRecord::new(
                ErrorCategory::Runtime,
                format!("{} was not prepared", self.builtin.name()),
            )
            .into()),
        }
    }
}

#[async_trait]
impl Lifecycle for BuiltinProcessor {
    #[tracing::instrument(level = "trace", skip_all, fields(builtin = %self.builtin.name()))]
    async fn prepare(&mut self, _has_input: bool) -> EvalResult<()> {
        let schema = self.builtin.schema();
        let args = BuiltinArgs::bind(&schema, self.args.take().unwrap_or_default())?;
        self.instance = Some(self.builtin.instantiate(args)?);
        Ok(())
    }

    async fn begin(&mut self, streams: &mut Streams) -> EvalResult<()> {
        let (instance, evaluator) = self.parts()?;
        instance.begin(&mut ExecContext::new(evaluator, streams)).await
    }

    async fn process(&mut self, input: Option<Value>, streams: &mut Streams) -> EvalResult<()> {
        let (instance, evaluator) = self.parts()?;
        instance.process(input, &mut ExecContext::new(evaluator, streams)).await
    }

    async fn end(&mut self, streams: &mut Streams) -> EvalResult<()> {
        let (instance, evaluator) = self.parts()?;
        instance.end(&mut ExecContext::new(evaluator, streams)).await
    }
}
