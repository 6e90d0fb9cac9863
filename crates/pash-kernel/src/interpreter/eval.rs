//! Statement and expression evaluation.
//!
//! The evaluator walks the AST and writes results to the [`Streams`] it is
//! handed as it produces them. Nothing is buffered unless the caller asked
//! for a collecting emitter, so a consumer reading the other end of a
//! bounded channel paces the producer.
//!
//! Errors follow the statement boundary rule: a non-terminating record
//! raised while executing a statement goes to the error stream and the
//! next statement runs. Inside `try` the record unwinds to `catch`
//! instead. Terminating records (from `throw`) always unwind.

use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use pash_types::{ErrorCategory, ErrorRecord, Record, ScriptBlockRef, Value};
use tokio_util::sync::CancellationToken;

use crate::ast::{
    Arg, Assignment, AssignValue, BinaryOp, BlockBody, CatchClause, Command, CommandName, Expr,
    ForEachLoop, ForLoop, IfStmt, Literal, ParamDef, Pipeline, PipelineElement, Program,
    ScriptBlockAst, Stmt, StringPart, TryStmt, VarRef, VarScope, WhileLoop,
};
use crate::dispatch::{CommandResolver, Resolved};
use crate::host::HostCapability;
use crate::ops;
use crate::processor::{CommandArg, CommandProcessor};
use crate::scheduler::{collapse, PipelineExecutor, Streams};
use crate::tools::BuiltinRegistry;

use super::control_flow::{EvalResult, Fail, Flow};
use super::members;
use super::scope::Scope;

/// Default capacity of the channel between two pipeline stages.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// State shared by every evaluator of one kernel.
pub struct Session {
    pub builtins: RwLock<BuiltinRegistry>,
    pub host: Arc<dyn HostCapability>,
    pub channel_capacity: usize,
    /// Directories searched for external programs.
    pub search_path: Vec<PathBuf>,
}

impl Session {
    pub fn new(builtins: BuiltinRegistry, host: Arc<dyn HostCapability>) -> Self {
        Self {
            builtins: RwLock::new(builtins),
            host,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            search_path: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel_capacity", &self.channel_capacity)
            .field("search_path", &self.search_path)
            .finish_non_exhaustive()
    }
}

fn runtime(message: impl Into<String>) -> ErrorRecord {
    ErrorRecord::new(ErrorCategory::Runtime, message)
}

/// Evaluates statements and expressions against a scope.
///
/// Cloning is cheap: the clone shares the scope's frames, the session and
/// the cancellation token. Pipeline stages each get their own clone.
#[derive(Clone)]
pub struct Evaluator {
    scope: Scope,
    session: Arc<Session>,
    cancel: CancellationToken,
    /// Nesting depth of `try` bodies; non-zero promotes statement errors.
    try_depth: usize,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("scope_depth", &self.scope.depth())
            .field("try_depth", &self.try_depth)
            .finish()
    }
}

impl Evaluator {
    pub fn new(scope: Scope, session: Arc<Session>, cancel: CancellationToken) -> Self {
        Self {
            scope,
            session,
            cancel,
            try_depth: 0,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// An evaluator over a child scope, for function and script block bodies.
    pub fn child(&self) -> Self {
        Self {
            scope: self.scope.child(),
            ..self.clone()
        }
    }

    pub fn check_cancelled(&self) -> EvalResult<()> {
        if self.cancel.is_cancelled() {
            Err(Fail::Stopped)
        } else {
            Ok(())
        }
    }

    /// Run a whole program. A top-level `return` ends it early.
    pub async fn run_program(&mut self, program: &Program, streams: &mut Streams) -> EvalResult<()> {
        self.execute_block(&program.statements, streams).await.map(|_| ())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════

    /// Execute statements in order until one leaves with a non-normal flow.
    pub fn execute_block<'a>(
        &'a mut self,
        stmts: &'a [Stmt],
        streams: &'a mut Streams,
    ) -> BoxFuture<'a, EvalResult<Flow>> {
        Box::pin(async move {
            for stmt in stmts {
                self.check_cancelled()?;
                let flow = self.execute_stmt(stmt, streams).await?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
            Ok(Flow::Normal)
        })
    }

    async fn execute_stmt(&mut self, stmt: &Stmt, streams: &mut Streams) -> EvalResult<Flow> {
        match self.execute_stmt_inner(stmt, streams).await {
            Err(Fail::Error(record)) if !record.terminating && self.try_depth == 0 => {
                streams.errors.write(record);
                Ok(Flow::Normal)
            }
            other => other,
        }
    }

    async fn execute_stmt_inner(&mut self, stmt: &Stmt, streams: &mut Streams) -> EvalResult<Flow> {
        match stmt {
            Stmt::Pipeline(pipeline) => {
                self.run_pipeline(pipeline, streams).await?;
                Ok(Flow::Normal)
            }
            Stmt::Assignment(assignment) => {
                self.assign(assignment, streams).await?;
                Ok(Flow::Normal)
            }
            Stmt::If(stmt) => self.execute_if(stmt, streams).await,
            Stmt::While(stmt) => self.execute_while(stmt, streams).await,
            Stmt::For(stmt) => self.execute_for(stmt, streams).await,
            Stmt::ForEach(stmt) => self.execute_foreach(stmt, streams).await,
            Stmt::Function(def) => {
                tracing::trace!(name = %def.name, "define function");
                self.scope.define_function(def.clone());
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                if let Some(pipeline) = value {
                    self.run_pipeline(pipeline, streams).await?;
                }
                Ok(Flow::Return)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(value) => {
                let value = match value {
                    Some(pipeline) => self.pipeline_value(pipeline, streams).await?,
                    None => Value::null(),
                };
                Err(Fail::Error(thrown(value)))
            }
            Stmt::Try(stmt) => self.execute_try(stmt, streams).await,
        }
    }

    async fn execute_if(&mut self, stmt: &IfStmt, streams: &mut Streams) -> EvalResult<Flow> {
        for (condition, body) in &stmt.clauses {
            if self.condition(condition, streams).await? {
                return self.execute_block(body, streams).await;
            }
        }
        match &stmt.else_branch {
            Some(body) => self.execute_block(body, streams).await,
            None => Ok(Flow::Normal),
        }
    }

    async fn execute_while(&mut self, stmt: &WhileLoop, streams: &mut Streams) -> EvalResult<Flow> {
        while self.condition(&stmt.condition, streams).await? {
            self.check_cancelled()?;
            match self.execute_block(&stmt.body, streams).await? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    async fn execute_for(&mut self, stmt: &ForLoop, streams: &mut Streams) -> EvalResult<Flow> {
        if let Some(init) = &stmt.init {
            self.execute_block(std::slice::from_ref(init.as_ref()), streams).await?;
        }
        loop {
            self.check_cancelled()?;
            if let Some(condition) = &stmt.condition {
                if !self.condition(condition, streams).await? {
                    break;
                }
            }
            match self.execute_block(&stmt.body, streams).await? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(step) = &stmt.step {
                self.execute_block(std::slice::from_ref(step.as_ref()), streams).await?;
            }
        }
        Ok(Flow::Normal)
    }

    async fn execute_foreach(&mut self, stmt: &ForEachLoop, streams: &mut Streams) -> EvalResult<Flow> {
        let items = self.pipeline_value(&stmt.items, streams).await?.unroll();
        for item in items {
            self.check_cancelled()?;
            self.scope.set(&stmt.variable, item);
            match self.execute_block(&stmt.body, streams).await? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    async fn execute_try(&mut self, stmt: &TryStmt, streams: &mut Streams) -> EvalResult<Flow> {
        self.try_depth += 1;
        let outcome = self.execute_block(&stmt.body, streams).await;
        self.try_depth -= 1;

        let outcome = match outcome {
            Err(Fail::Error(record)) => {
                match stmt.catches.iter().find(|clause| catches(clause, &record)) {
                    Some(clause) => {
                        tracing::debug!(category = %record.category, "caught error record");
                        self.scope.set_automatic("_", record.to_value());
                        self.execute_block(&clause.body, streams).await
                    }
                    None => Err(Fail::Error(record)),
                }
            }
            other => other,
        };

        if let Some(finally) = &stmt.finally {
            self.execute_block(finally, streams).await?;
        }
        outcome
    }

    async fn condition(&mut self, pipeline: &Pipeline, streams: &mut Streams) -> EvalResult<bool> {
        Ok(self.pipeline_value(pipeline, streams).await?.is_truthy())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Pipelines
    // ═══════════════════════════════════════════════════════════════════

    /// Run a pipeline, writing its output to `streams`.
    pub fn run_pipeline<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        streams: &'a mut Streams,
    ) -> BoxFuture<'a, EvalResult<()>> {
        Box::pin(async move {
            let (feed, commands) = match pipeline.elements.split_first() {
                Some((PipelineElement::Expression(expr), rest)) => {
                    let value = self.eval_expr(expr, streams).await?;
                    if rest.is_empty() {
                        return streams.output.write(value, &self.cancel).await;
                    }
                    (Some(value.enumerate()), rest)
                }
                _ => (None, pipeline.elements.as_slice()),
            };

            let mut stages = Vec::with_capacity(commands.len());
            for element in commands {
                let PipelineElement::Command(command) = element else {
                    return Err(runtime(
                        "Expressions are only allowed as the first element of a pipeline.",
                    )
                    .into());
                };
                stages.push(self.build_processor(command, streams).await?);
            }

            let mut executor = PipelineExecutor::new(self.session.channel_capacity)
                .with_promoted_errors(self.try_depth > 0);
            executor.run(stages, feed, streams, &self.cancel).await.map(|_| ())
        })
    }

    /// The value a pipeline produces when used as an operand: an
    /// expression as is, commands collected (none is `$null`, one is
    /// itself, more is a sequence).
    pub async fn pipeline_value(&mut self, pipeline: &Pipeline, streams: &mut Streams) -> EvalResult<Value> {
        if let Some(expr) = pipeline.as_expression() {
            return self.eval_expr(expr, streams).await;
        }
        let mut collected = Streams::collecting(&streams.errors);
        self.run_pipeline(pipeline, &mut collected).await?;
        Ok(collapse(collected.output.take_collected()))
    }

    /// Everything a block writes, with errors forwarded to `streams`.
    async fn collect_block(&mut self, stmts: &[Stmt], streams: &mut Streams) -> EvalResult<Vec<Value>> {
        let mut collected = Streams::collecting(&streams.errors);
        self.execute_block(stmts, &mut collected).await?;
        Ok(collected.output.take_collected())
    }

    async fn build_processor(&mut self, command: &Command, streams: &mut Streams) -> EvalResult<CommandProcessor> {
        let mut args = Vec::with_capacity(command.args.len());
        for arg in &command.args {
            args.push(match arg {
                Arg::Positional(expr) => CommandArg::Positional(self.eval_expr(expr, streams).await?),
                Arg::Parameter(name) => CommandArg::Parameter(name.clone()),
            });
        }

        let (name, resolved) = match &command.name {
            CommandName::Bare(name) => (name.clone(), CommandResolver::resolve(name, self)?),
            CommandName::Dynamic(expr) => {
                let target = self.eval_expr(expr, streams).await?;
                match target.as_script_block() {
                    Some(block) => ("<script block>".to_string(), Resolved::ScriptBlock(block.clone())),
                    None => {
                        let name = target.to_string();
                        let resolved = CommandResolver::resolve(&name, self)?;
                        (name, resolved)
                    }
                }
            }
        };
        CommandProcessor::new(name, resolved, args, self)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Assignment
    // ═══════════════════════════════════════════════════════════════════

    fn assign<'a>(
        &'a mut self,
        assignment: &'a Assignment,
        streams: &'a mut Streams,
    ) -> BoxFuture<'a, EvalResult<Value>> {
        Box::pin(async move {
            let rhs = match assignment.value.as_ref() {
                AssignValue::Pipeline(pipeline) => self.pipeline_value(pipeline, streams).await?,
                AssignValue::Assignment(inner) => self.assign(inner, streams).await?,
            };
            let value = match assignment.op.binary_op() {
                Some(op) => {
                    let current = self.eval_expr(&assignment.target, streams).await?;
                    ops::binary(op, &current, &rhs)?
                }
                None => rhs,
            };
            self.assign_to(&assignment.target, value.clone(), streams).await?;
            Ok(value)
        })
    }

    /// Store into an lvalue. Index and member targets rebuild their
    /// container and store it back into the container's own lvalue.
    fn assign_to<'a>(
        &'a mut self,
        target: &'a Expr,
        value: Value,
        streams: &'a mut Streams,
    ) -> BoxFuture<'a, EvalResult<()>> {
        Box::pin(async move {
            match target {
                Expr::Variable(var) => {
                    self.scope.set(var, value);
                    Ok(())
                }
                Expr::Index { target: container, index } => {
                    let current = self.eval_expr(container, streams).await?;
                    let index = self.eval_expr(index, streams).await?;
                    let updated = members::set_index(current, &index, value)?;
                    self.assign_to(container, updated, streams).await
                }
                Expr::Member { target: container, name } => {
                    let current = self.eval_expr(container, streams).await?;
                    let updated = members::set_member(current, name, value)?;
                    self.assign_to(container, updated, streams).await
                }
                _ => Err(runtime("The assignment expression is not valid.").into()),
            }
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a value.
    pub fn eval_expr<'a>(
        &'a mut self,
        expr: &'a Expr,
        streams: &'a mut Streams,
    ) -> BoxFuture<'a, EvalResult<Value>> {
        Box::pin(async move {
            match expr {
                Expr::Literal(literal) => Ok(literal_value(literal)),
                Expr::Expandable(parts) => self.expand(parts, streams).await.map(Value::from),
                Expr::Variable(var) => Ok(self.variable(var)),
                Expr::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval_expr(item, streams).await?);
                    }
                    Ok(Value::sequence(values))
                }
                Expr::ArraySub(stmts) => Ok(Value::sequence(self.collect_block(stmts, streams).await?)),
                Expr::SubExpr(stmts) => Ok(collapse(self.collect_block(stmts, streams).await?)),
                Expr::Paren(pipeline) => self.pipeline_value(pipeline, streams).await,
                Expr::Hash(entries) => {
                    let mut record = Record::new();
                    for (key, value) in entries {
                        let key = self.eval_expr(key, streams).await?.to_string();
                        let value = self.pipeline_value(value, streams).await?;
                        record.insert(key, value);
                    }
                    Ok(Value::record(record))
                }
                Expr::ScriptBlock(block) => Ok(script_block_value(block)),
                Expr::TypeLiteral(name) => Ok(members::type_literal(name)),
                Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, streams).await,
                Expr::Unary { op, operand } => {
                    let value = self.eval_expr(operand, streams).await?;
                    Ok(ops::unary(*op, &value)?)
                }
                Expr::Cast { type_name, operand } => {
                    let value = self.eval_expr(operand, streams).await?;
                    Ok(ops::cast(&value, type_name)?)
                }
                Expr::Member { target, name } => {
                    let value = self.eval_expr(target, streams).await?;
                    members::get_member(&value, name, self.session.host.as_ref())
                }
                Expr::MethodCall { target, name, args } => {
                    let value = self.eval_expr(target, streams).await?;
                    let args = self.eval_args(args, streams).await?;
                    match value.as_script_block() {
                        Some(block) if name.eq_ignore_ascii_case("invoke") => {
                            let mut collected = Streams::collecting(&streams.errors);
                            self.invoke_script_block(block, None, args, true, &mut collected)
                                .await?;
                            Ok(collapse(collected.output.take_collected()))
                        }
                        _ => members::call_method(&value, name, &args, self.session.host.as_ref()),
                    }
                }
                Expr::StaticMember { type_name, name } => {
                    Ok(self.session.host.invoke(type_name, name, &[])?)
                }
                Expr::StaticCall { type_name, name, args } => {
                    let args = self.eval_args(args, streams).await?;
                    Ok(self.session.host.invoke(type_name, name, &args)?)
                }
                Expr::Index { target, index } => {
                    let value = self.eval_expr(target, streams).await?;
                    let index = self.eval_expr(index, streams).await?;
                    members::index(&value, &index)
                }
            }
        })
    }

    async fn eval_args(&mut self, args: &[Expr], streams: &mut Streams) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, streams).await?);
        }
        Ok(values)
    }

    async fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        streams: &mut Streams,
    ) -> EvalResult<Value> {
        let lhs = self.eval_expr(left, streams).await?;
        match op {
            BinaryOp::And if !lhs.is_truthy() => return Ok(Value::from(false)),
            BinaryOp::Or if lhs.is_truthy() => return Ok(Value::from(true)),
            _ => {}
        }
        let rhs = self.eval_expr(right, streams).await?;
        Ok(ops::binary(op, &lhs, &rhs)?)
    }

    /// Variable lookup. Unset variables read as `$null`.
    pub fn variable(&self, var: &VarRef) -> Value {
        if var.scope == VarScope::Any {
            match var.name.to_ascii_lowercase().as_str() {
                "true" => return Value::from(true),
                "false" => return Value::from(false),
                "null" => return Value::null(),
                _ => {}
            }
        }
        self.scope.get(var).unwrap_or_default()
    }

    async fn expand(&mut self, parts: &[StringPart], streams: &mut Streams) -> EvalResult<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                StringPart::Literal(text) => out.push_str(text),
                StringPart::Variable(var) => out.push_str(&self.variable(var).to_string()),
                StringPart::SubExpr(stmts) => {
                    let values = self.collect_block(stmts, streams).await?;
                    let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
                    out.push_str(&rendered.join(" "));
                }
            }
        }
        Ok(out)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Script blocks and parameters
    // ═══════════════════════════════════════════════════════════════════

    /// Run a script block value once, all of its named blocks in order.
    ///
    /// With `new_scope` false the block runs dot-sourced (how
    /// `ForEach-Object` and `Where-Object` run theirs): its assignments are
    /// visible to the caller, but `$_` and `$args` live in a frame of
    /// their own for this invocation.
    pub async fn invoke_script_block(
        &mut self,
        block: &ScriptBlockRef,
        dollar_under: Option<Value>,
        args: Vec<Value>,
        new_scope: bool,
        streams: &mut Streams,
    ) -> EvalResult<()> {
        let ast = script_block_ast(block)?;
        let mut runner = if new_scope {
            self.child()
        } else {
            Self {
                scope: self.scope.dot_sourced(),
                ..self.clone()
            }
        };
        if let Some(value) = dollar_under {
            runner.scope.set_automatic("_", value);
        }
        if new_scope {
            let args = args.into_iter().map(CommandArg::Positional).collect();
            runner.bind_parameters(&ast.params, args, streams).await?;
        } else {
            runner.scope.set_automatic("args", Value::sequence(args));
        }

        match &ast.body {
            BlockBody::Plain(stmts) => {
                runner.execute_block(stmts, streams).await?;
            }
            BlockBody::Named(named) => {
                for stmts in [&named.begin, &named.process, &named.end].into_iter().flatten() {
                    runner.execute_block(stmts, streams).await?;
                }
            }
        }
        Ok(())
    }

    /// Bind command arguments to declared parameters in this evaluator's
    /// local frame. Leftover arguments become `$args`.
    pub async fn bind_parameters(
        &mut self,
        params: &[ParamDef],
        args: Vec<CommandArg>,
        streams: &mut Streams,
    ) -> EvalResult<()> {
        let mut bound: Vec<Option<Value>> = vec![None; params.len()];
        let mut positional = Vec::new();
        let mut rest = Vec::new();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            match arg {
                CommandArg::Positional(value) => positional.push(value),
                CommandArg::Parameter(name) => match match_parameter(params, &name)? {
                    Some(i) => {
                        let is_switch = params[i]
                            .type_name
                            .as_deref()
                            .is_some_and(|t| t.eq_ignore_ascii_case("switch"));
                        let value = match args.peek() {
                            Some(CommandArg::Positional(_)) if !is_switch => match args.next() {
                                Some(CommandArg::Positional(value)) => value,
                                _ => Value::from(true),
                            },
                            _ => Value::from(true),
                        };
                        bound[i] = Some(value);
                    }
                    None => rest.push(Value::from(format!("-{}", name))),
                },
            }
        }

        let mut positional = positional.into_iter();
        for slot in bound.iter_mut().filter(|slot| slot.is_none()) {
            match positional.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
        rest.extend(positional);

        for (param, value) in params.iter().zip(bound) {
            let value = match (value, &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval_expr(default, streams).await?,
                (None, None) => Value::null(),
            };
            let value = match param.type_name.as_deref() {
                Some(t) if t.eq_ignore_ascii_case("switch") => Value::from(value.is_truthy()),
                Some(t) => ops::cast(&value, t)?,
                None => value,
            };
            self.scope.set_local(&param.name, value);
        }
        self.scope.set_local("args", Value::sequence(rest));
        Ok(())
    }
}

/// Find a parameter by exact name or unique prefix, case-insensitively.
fn match_parameter(params: &[ParamDef], name: &str) -> EvalResult<Option<usize>> {
    if let Some(i) = params.iter().position(|p| p.name.eq_ignore_ascii_case(name)) {
        return Ok(Some(i));
    }
    let lower = name.to_ascii_lowercase();
    let candidates: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.name.to_ascii_lowercase().starts_with(&lower))
        .map(|(i, _)| i)
        .collect();
    match candidates.as_slice() {
        [] => Ok(None),
        [i] => Ok(Some(*i)),
        _ => Err(runtime(format!(
            "Parameter cannot be processed because the parameter name '{}' is ambiguous.",
            name
        ))
        .with_target(name)
        .into()),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int32(n) => Value::from(*n),
        Literal::Int64(n) => Value::from(*n),
        Literal::Double(n) => Value::from(*n),
        Literal::Decimal(d) => Value::from(d.clone()),
        Literal::String(s) => Value::from(s.as_str()),
    }
}

/// Wrap a parsed block as a script block value.
pub fn script_block_value(block: &Arc<ScriptBlockAst>) -> Value {
    let body: Arc<dyn Any + Send + Sync> = block.clone();
    Value::script_block(ScriptBlockRef::new(block.text.as_str(), body))
}

/// The parsed body behind a script block value.
pub fn script_block_ast(block: &ScriptBlockRef) -> EvalResult<Arc<ScriptBlockAst>> {
    block
        .body::<ScriptBlockAst>()
        .ok_or_else(|| runtime("The script block has no executable body.").into())
}

fn thrown(value: Value) -> ErrorRecord {
    if value.is_null() {
        return ErrorRecord::thrown("ScriptHalted");
    }
    let record = ErrorRecord::thrown(value.to_string());
    match value.property("TargetObject").filter(|t| !t.is_null()) {
        Some(target) => record.with_target(target.to_string()),
        None => record,
    }
}

/// Exception type names each category answers to in `catch [Type]`.
fn catch_names(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::InvalidCast => &["InvalidCastException", "PSInvalidCastException"],
        ErrorCategory::IncompatibleTypes => &["InvalidOperationException"],
        ErrorCategory::DivideByZero => &["DivideByZeroException", "ArithmeticException"],
        ErrorCategory::CommandNotFound => &["CommandNotFoundException"],
        ErrorCategory::PipelineStopped => &["PipelineStoppedException"],
        ErrorCategory::LexError | ErrorCategory::ParseError => &["ParseException"],
        ErrorCategory::ExternalProcess => &["ApplicationFailedException"],
        ErrorCategory::Host => &["MethodInvocationException"],
        ErrorCategory::Runtime => &[],
    }
}

fn catches(clause: &CatchClause, record: &ErrorRecord) -> bool {
    if clause.types.is_empty() {
        return true;
    }
    clause.types.iter().any(|ty| {
        let short = ty
            .rsplit('.')
            .next()
            .unwrap_or(ty.as_str())
            .to_ascii_lowercase();
        matches!(short.as_str(), "exception" | "runtimeexception")
            || catch_names(record.category)
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&short))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StandardHost;
    use crate::parser::parse;
    use crate::scheduler::{error_stream, Emitter};
    use crate::tools::register_builtins;

    fn evaluator() -> Evaluator {
        let mut builtins = BuiltinRegistry::new();
        register_builtins(&mut builtins);
        let session = Session::new(builtins, Arc::new(StandardHost));
        Evaluator::new(Scope::new(), Arc::new(session), CancellationToken::new())
    }

    async fn run(source: &str) -> (Vec<Value>, Vec<ErrorRecord>, EvalResult<()>) {
        let program = parse(source).expect("parse");
        let (errors, mut receiver) = error_stream();
        let mut streams = Streams::new(Emitter::collect(), errors);
        let mut eval = evaluator();
        let result = eval.run_program(&program, &mut streams).await;
        (streams.output.take_collected(), receiver.drain(), result)
    }

    fn strings(values: &[Value]) -> Vec<String> {
        values.iter().map(Value::to_string).collect()
    }

    #[tokio::test]
    async fn statement_errors_do_not_stop_the_script() {
        let (out, errors, result) = run("1/0\n'after'").await;
        assert!(result.is_ok());
        assert_eq!(strings(&out), ["after"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::DivideByZero);
    }

    #[tokio::test]
    async fn try_catches_statement_errors() {
        let (out, errors, _) = run("try { 1/0; 'skipped' } catch { 'caught' } finally { 'done' }").await;
        assert_eq!(strings(&out), ["caught", "done"]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn typed_catch_clauses() {
        let source = "try { [int]'abc' } catch [DivideByZeroException] { 'div' } catch [System.InvalidCastException] { 'cast' }";
        let (out, _, _) = run(source).await;
        assert_eq!(strings(&out), ["cast"]);
    }

    #[tokio::test]
    async fn throw_is_terminating() {
        let (out, _, result) = run("'before'; throw 'boom'; 'after'").await;
        assert_eq!(strings(&out), ["before"]);
        match result {
            Err(Fail::Error(record)) => {
                assert!(record.terminating);
                assert_eq!(record.message, "boom");
            }
            other => panic!("expected a thrown record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn loops_and_flow() {
        let (out, _, _) = run("for ($i = 0; $i -lt 3; $i += 1) { $i * 10 }").await;
        assert_eq!(strings(&out), ["0", "10", "20"]);

        let (out, _, _) = run("$n = 0; while ($true) { $n += 1; if ($n -ge 3) { break } }; $n").await;
        assert_eq!(strings(&out), ["3"]);

        let (out, _, _) = run("foreach ($x in 1..5) { if ($x % 2) { continue }; $x }").await;
        assert_eq!(strings(&out), ["2", "4"]);
    }

    #[tokio::test]
    async fn array_construction_rules() {
        let (out, _, _) = run("$a = @(); $a.Length").await;
        assert_eq!(strings(&out), ["0"]);

        let (out, _, _) = run("$a = 1,2,@(4),,3; $a.Length").await;
        assert_eq!(strings(&out), ["4"]);

        let (out, _, _) = run("@(@(@('foo'))).Length").await;
        assert_eq!(strings(&out), ["1"]);

        let (out, _, _) = run("$x = (5); $x.GetType().Name").await;
        assert_eq!(strings(&out), ["Int32"]);
    }

    #[tokio::test]
    async fn index_and_member_assignment() {
        let (out, _, _) = run("$a = 1,2,3; $a[1] = 'b'; $a -join ','").await;
        assert_eq!(strings(&out), ["1,b,3"]);

        let (out, _, _) = run("$h = @{ a = 1 }; $h.b = 2; $h['c'] = 3; $h.Count").await;
        assert_eq!(strings(&out), ["3"]);
    }

    #[tokio::test]
    async fn string_expansion() {
        let (out, _, _) = run("$name = 'pash'; \"hi $name, $(1 + 2)\"").await;
        assert_eq!(strings(&out), ["hi pash, 3"]);
    }

    #[tokio::test]
    async fn logical_operators_short_circuit() {
        let (out, errors, _) = run("$false -and (1/0)").await;
        assert_eq!(strings(&out), ["False"]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn script_block_invoke() {
        let (out, _, _) = run("$sb = { param($x) $x * 2 }; $sb.Invoke(21)").await;
        assert_eq!(strings(&out), ["42"]);
    }

    #[tokio::test]
    async fn static_members_go_to_the_host() {
        let (out, _, _) = run("[Math]::Sqrt(16); [int]::MaxValue").await;
        assert_eq!(strings(&out), ["4", "2147483647"]);
    }

    #[tokio::test]
    async fn cancellation_stops_evaluation() {
        let program = parse("while ($true) { }").expect("parse");
        let (errors, _receiver) = error_stream();
        let mut streams = Streams::new(Emitter::collect(), errors);
        let mut eval = evaluator();
        eval.cancel_token().cancel();
        assert!(matches!(
            eval.run_program(&program, &mut streams).await,
            Err(Fail::Stopped)
        ));
    }

    #[test]
    fn parameter_prefixes() {
        let params = vec![
            ParamDef { name: "Name".into(), type_name: None, default: None },
            ParamDef { name: "Number".into(), type_name: None, default: None },
            ParamDef { name: "Path".into(), type_name: None, default: None },
        ];
        assert_eq!(match_parameter(&params, "pa").unwrap(), Some(2));
        assert_eq!(match_parameter(&params, "NAME").unwrap(), Some(0));
        assert!(match_parameter(&params, "n").is_err());
        assert_eq!(match_parameter(&params, "x").unwrap(), None);
    }
}
