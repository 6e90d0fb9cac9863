//! Command processors: one per pipeline stage.
//!
//! A processor is what a resolved command becomes once its arguments are
//! known. The executor drives every processor through the same lifecycle:
//!
//! ```text
//! prepare ──▶ begin ──▶ process(v) for each input (or once with none) ──▶ end
//! ```
//!
//! Processors release what they hold on drop. An aborted stage task drops
//! its processor, which kills a running child process.

mod builtin;
mod external;
mod function;

use async_trait::async_trait;
use pash_types::Value;

use crate::dispatch::Resolved;
use crate::interpreter::{script_block_ast, EvalResult, Evaluator, FORCE_SYNC_PROCESS_OUTPUT};
use crate::scheduler::Streams;

pub use builtin::BuiltinProcessor;
pub use external::{quote_arguments, ExternalProcessAdapter};
pub use function::FunctionProcessor;

/// An evaluated command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    Positional(Value),
    /// `-Name`, without the dash.
    Parameter(String),
}

impl CommandArg {
    /// Arguments as strings for an external program. Sequences splat into
    /// one argument per element.
    pub fn to_argv(args: &[CommandArg]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                CommandArg::Positional(value) if value.as_sequence().is_some() => {
                    argv.extend(value.clone().unroll().iter().map(Value::to_string));
                }
                CommandArg::Positional(value) => argv.push(value.to_string()),
                CommandArg::Parameter(name) => argv.push(format!("-{}", name)),
            }
        }
        argv
    }
}

/// The phases every pipeline stage goes through.
#[async_trait]
pub trait Lifecycle: Send {
    /// Called before any stage starts. `has_input` is true when something
    /// is piped into this stage.
    async fn prepare(&mut self, has_input: bool) -> EvalResult<()> {
        let _ = has_input;
        Ok(())
    }

    async fn begin(&mut self, _streams: &mut Streams) -> EvalResult<()> {
        Ok(())
    }

    /// Handle one input value, or `None` when the stage has no input.
    async fn process(&mut self, input: Option<Value>, streams: &mut Streams) -> EvalResult<()>;

    async fn end(&mut self, _streams: &mut Streams) -> EvalResult<()> {
        Ok(())
    }
}

/// A pipeline stage.
pub enum CommandProcessor {
    Function(FunctionProcessor),
    Builtin(BuiltinProcessor),
    External(ExternalProcessAdapter),
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandProcessor::Function(p) => f.debug_tuple("Function").field(&p.name()).finish(),
            CommandProcessor::Builtin(p) => f.debug_tuple("Builtin").field(&p.name()).finish(),
            CommandProcessor::External(p) => f.debug_tuple("External").field(&p.name()).finish(),
        }
    }
}

impl CommandProcessor {
    /// Build the processor for a resolved command.
    pub fn new(
        name: String,
        resolved: Resolved,
        args: Vec<CommandArg>,
        evaluator: &Evaluator,
    ) -> EvalResult<Self> {
        Ok(match resolved {
            Resolved::Function(def) => CommandProcessor::Function(FunctionProcessor::new(
                name,
                def.kind,
                def.body.clone(),
                args,
                evaluator.child(),
            )),
            Resolved::ScriptBlock(block) => CommandProcessor::Function(FunctionProcessor::new(
                name,
                crate::ast::FunctionKind::Function,
                script_block_ast(&block)?,
                args,
                evaluator.child(),
            )),
            Resolved::Builtin(builtin) => CommandProcessor::Builtin(BuiltinProcessor::new(
                builtin,
                args,
                evaluator.clone(),
            )),
            Resolved::External(path) => {
                let force_sync = evaluator.scope().get_flag(FORCE_SYNC_PROCESS_OUTPUT);
                CommandProcessor::External(ExternalProcessAdapter::new(
                    name,
                    path,
                    CommandArg::to_argv(&args),
                    force_sync,
                    evaluator.scope().clone(),
                    evaluator.cancel_token().clone(),
                ))
            }
        })
    }
}

#[async_trait]
impl Lifecycle for CommandProcessor {
    async fn prepare(&mut self, has_input: bool) -> EvalResult<()> {
        match self {
            CommandProcessor::Function(p) => p.prepare(has_input).await,
            CommandProcessor::Builtin(p) => p.prepare(has_input).await,
            CommandProcessor::External(p) => p.prepare(has_input).await,
        }
    }

    async fn begin(&mut self, streams: &mut Streams) -> EvalResult<()> {
        match self {
            CommandProcessor::Function(p) => p.begin(streams).await,
            CommandProcessor::Builtin(p) => p.begin(streams).await,
            CommandProcessor::External(p) => p.begin(streams).await,
        }
    }

    async fn process(&mut self, input: Option<Value>, streams: &mut Streams) -> EvalResult<()> {
        match self {
            CommandProcessor::Function(p) => p.process(input, streams).await,
            CommandProcessor::Builtin(p) => p.process(input, streams).await,
            CommandProcessor::External(p) => p.process(input, streams).await,
        }
    }

    async fn end(&mut self, streams: &mut Streams) -> EvalResult<()> {
        match self {
            CommandProcessor::Function(p) => p.end(streams).await,
            CommandProcessor::Builtin(p) => p.end(streams).await,
            CommandProcessor::External(p) => p.end(streams).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_splats_sequences() {
        let args = vec![
            CommandArg::Positional(Value::sequence(vec![Value::from(1), Value::from("two")])),
            CommandArg::Parameter("Verbose".to_string()),
            CommandArg::Positional(Value::from("x y")),
        ];
        assert_eq!(CommandArg::to_argv(&args), ["1", "two", "-Verbose", "x y"]);
    }
}
