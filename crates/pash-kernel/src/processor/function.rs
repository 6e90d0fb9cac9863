//! Functions, filters and invoked script blocks as pipeline stages.

use std::sync::Arc;

use async_trait::async_trait;
use pash_types::Value;

use crate::ast::{BlockBody, FunctionKind, ScriptBlockAst, Stmt};
use crate::interpreter::{EvalResult, Evaluator};
use crate::scheduler::Streams;

use super::{CommandArg, Lifecycle};

/// Runs a script body in its own child scope.
///
/// - plain function body: input is collected and the body runs once at
///   `end` with `$input`
/// - filter body: runs once per input with `$_`
/// - `begin`/`process`/`end` blocks: each runs in its phase
pub struct FunctionProcessor {
    name: String,
    kind: FunctionKind,
    body: Arc<ScriptBlockAst>,
    args: Option<Vec<CommandArg>>,
    evaluator: Evaluator,
    input: Vec<Value>,
}

impl FunctionProcessor {
    pub fn new(
        name: String,
        kind: FunctionKind,
        body: Arc<ScriptBlockAst>,
        args: Vec<CommandArg>,
        evaluator: Evaluator,
    ) -> Self {
        Self {
            name,
            kind,
            body,
            args: Some(args),
            evaluator,
            input: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one phase. `return` only ends the phase.
    async fn run_phase(&mut self, stmts: &[Stmt], streams: &mut Streams) -> EvalResult<()> {
        self.evaluator.execute_block(stmts, streams).await?;
        Ok(())
    }
}

#[async_trait]
impl Lifecycle for FunctionProcessor {
    #[tracing::instrument(level = "trace", skip_all, fields(function = %self.name))]
    async fn begin(&mut self, streams: &mut Streams) -> EvalResult<()> {
        let args = self.args.take().unwrap_or_default();
        let body = self.body.clone();
        self.evaluator.bind_parameters(&body.params, args, streams).await?;

        if let BlockBody::Named(named) = &body.body {
            if let Some(begin) = &named.begin {
                self.run_phase(begin, streams).await?;
            }
        }
        Ok(())
    }

    async fn process(&mut self, input: Option<Value>, streams: &mut Streams) -> EvalResult<()> {
        let body = self.body.clone();
        match (&body.body, self.kind) {
            (BlockBody::Named(named), _) => {
                self.evaluator
                    .scope()
                    .set_local("_", input.unwrap_or_default());
                if let Some(process) = &named.process {
                    self.run_phase(process, streams).await?;
                }
            }
            (BlockBody::Plain(stmts), FunctionKind::Filter) => {
                self.evaluator
                    .scope()
                    .set_local("_", input.unwrap_or_default());
                self.run_phase(stmts, streams).await?;
            }
            (BlockBody::Plain(_), FunctionKind::Function) => {
                if let Some(value) = input {
                    self.input.push(value);
                }
            }
        }
        Ok(())
    }

    async fn end(&mut self, streams: &mut Streams) -> EvalResult<()> {
        let body = self.body.clone();
        match (&body.body, self.kind) {
            (BlockBody::Named(named), _) => {
                if let Some(end) = &named.end {
                    self.run_phase(end, streams).await?;
                }
            }
            (BlockBody::Plain(stmts), FunctionKind::Function) => {
                let input = std::mem::take(&mut self.input);
                self.evaluator
                    .scope()
                    .set_local("input", Value::sequence(input));
                self.run_phase(stmts, streams).await?;
            }
            (BlockBody::Plain(_), FunctionKind::Filter) => {}
        }
        Ok(())
    }
}
