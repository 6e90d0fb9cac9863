//! The Kernel: the heart of pash.
//!
//! The Kernel owns and coordinates all core components:
//! - Global scope (variables, functions, session flags)
//! - Session (builtin registry, host capability, search path)
//! - Cancellation of whatever is running
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Kernel                            │
//! │  ┌──────────────┐  ┌─────────────────┐  ┌───────────────┐  │
//! │  │   Scope      │  │ BuiltinRegistry │  │ HostCapability│  │
//! │  │  (variables, │  │  (Write-Output, │  │  ([Math], …)  │  │
//! │  │   functions) │  │   Sort-Object…) │  │               │  │
//! │  └──────────────┘  └─────────────────┘  └───────────────┘  │
//! │  ┌──────────────────────────────┐  ┌───────────────────┐   │
//! │  │  Evaluator → PipelineExecutor│  │ CancellationToken │   │
//! │  └──────────────────────────────┘  └───────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A script runs as one top-level pipeline: its output and error records
//! come back in a [`PipelineResult`] whose state is the script's state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use pash_types::{ErrorCategory, ErrorRecord, PipelineResult, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::dispatch::split_search_path;
use crate::error::KernelError;
use crate::host::{HostCapability, StandardHost};
use crate::interpreter::{
    Evaluator, Fail, Scope, Session, DEFAULT_CHANNEL_CAPACITY, FORCE_SYNC_PROCESS_OUTPUT,
};
use crate::parser::parse;
use crate::scheduler::{error_stream, Emitter, Streams};
use crate::tools::{register_builtins, Builtin, BuiltinRegistry};

/// Configuration for kernel initialization.
#[derive(Clone)]
pub struct KernelConfig {
    /// Name of this kernel (for identification).
    pub name: String,

    /// Capacity of the channel between two pipeline stages.
    pub channel_capacity: usize,

    /// Directories searched for external programs, in order.
    pub search_path: Vec<PathBuf>,

    /// Static members and host objects.
    pub host: Arc<dyn HostCapability>,

    /// Initial value of `$ForceSynchronizeProcessOutput`.
    pub force_sync_process_output: bool,

    /// Whether the kernel serves an interactive prompt.
    pub interactive: bool,
}

impl std::fmt::Debug for KernelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelConfig")
            .field("name", &self.name)
            .field("channel_capacity", &self.channel_capacity)
            .field("search_path", &self.search_path)
            .field("force_sync_process_output", &self.force_sync_process_output)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

/// The process `PATH`, read once per config.
fn default_search_path() -> Vec<PathBuf> {
    std::env::var("PATH")
        .map(|path| split_search_path(&path))
        .unwrap_or_default()
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            search_path: default_search_path(),
            host: Arc::new(StandardHost),
            force_sync_process_output: false,
            interactive: false,
        }
    }
}

impl KernelConfig {
    /// Create a kernel config with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Create a config for the interactive REPL.
    pub fn repl() -> Self {
        Self {
            name: "repl".to_string(),
            interactive: true,
            ..Self::default()
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_search_path(mut self, search_path: Vec<PathBuf>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostCapability>) -> Self {
        self.host = host;
        self
    }

    pub fn with_force_sync_process_output(mut self, force: bool) -> Self {
        self.force_sync_process_output = force;
        self
    }
}

/// The pash kernel.
pub struct Kernel {
    name: String,
    session: Arc<Session>,
    scope: RwLock<Scope>,
    /// Token for the current run; replaced once it has fired.
    cancel: Mutex<CancellationToken>,
    force_sync_process_output: bool,
    interactive: bool,
}

impl Kernel {
    /// Create a new kernel with the given configuration.
    pub fn new(config: KernelConfig) -> Result<Self> {
        let mut builtins = BuiltinRegistry::new();
        register_builtins(&mut builtins);

        let mut session = Session::new(builtins, config.host.clone());
        session.channel_capacity = config.channel_capacity;
        session.search_path = config.search_path.clone();

        if config.channel_capacity == 0 {
            return Err(KernelError::Runtime(ErrorRecord::new(
                ErrorCategory::Runtime,
                "channel capacity must be at least 1",
            ))
            .into());
        }

        let scope = Scope::new();
        init_scope(&scope, config.force_sync_process_output);
        tracing::debug!(name = %config.name, search_dirs = session.search_path.len(), "kernel created");

        Ok(Self {
            name: config.name,
            session: Arc::new(session),
            scope: RwLock::new(scope),
            cancel: Mutex::new(CancellationToken::new()),
            force_sync_process_output: config.force_sync_process_output,
            interactive: config.interactive,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Execute pash source and collect everything it writes.
    pub async fn execute(&self, input: &str) -> Result<PipelineResult> {
        self.execute_streaming(input, &mut |_| {}).await
    }

    /// Execute pash source, passing each output value to `on_output` as it
    /// reaches the end of the top-level pipeline.
    ///
    /// Lex and parse errors are returned as `Err` and nothing runs. Every
    /// runtime outcome, including a terminating error, is an `Ok` result
    /// whose state says how the script ended.
    #[tracing::instrument(level = "info", skip(self, on_output), fields(input_len = input.len()))]
    pub async fn execute_streaming(
        &self,
        input: &str,
        on_output: &mut (dyn FnMut(&Value) + Send),
    ) -> Result<PipelineResult> {
        let program = parse(input).map_err(|errors| KernelError::from_parse_errors(input, &errors))?;

        let scope = self.scope.read().await.clone();
        let cancel = self.fresh_token();
        let mut evaluator = Evaluator::new(scope, self.session.clone(), cancel);

        let (errors, mut error_rx) = error_stream();
        let (tx, mut rx) = mpsc::channel(self.session.channel_capacity);
        let mut streams = Streams::new(Emitter::Channel(tx), errors);

        let run = async {
            let outcome = evaluator.run_program(&program, &mut streams).await;
            // closes the output channel so the drain below finishes
            drop(streams);
            outcome
        };
        let drain = async {
            let mut output = Vec::new();
            while let Some(value) = rx.recv().await {
                on_output(&value);
                output.push(value);
            }
            output
        };
        let (outcome, output) = tokio::join!(run, drain);
        let errors = error_rx.drain();

        let result = match outcome {
            Ok(()) | Err(Fail::OutputClosed) => PipelineResult::completed(output, errors),
            Err(Fail::Stopped) => PipelineResult::stopped(output, errors),
            Err(Fail::Error(record)) if record.terminating => PipelineResult::failed(output, errors, record),
            Err(Fail::Error(record)) => {
                let mut errors = errors;
                errors.push(record);
                PipelineResult::completed(output, errors)
            }
        };
        tracing::debug!(state = %result.state, errors = result.errors.len(), "script finished");
        Ok(result)
    }

    /// The current run's token, or a new one if the last run was cancelled.
    fn fresh_token(&self) -> CancellationToken {
        let mut cancel = self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
        cancel.clone()
    }

    /// Token that stops the current run, or the next one if nothing is
    /// running, when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.fresh_token()
    }

    /// Stop whatever is running.
    pub fn cancel(&self) {
        tracing::debug!(name = %self.name, "cancel requested");
        self.cancel_token().cancel();
    }

    // --- Variables ---

    /// Get a global variable's value.
    pub async fn get_var(&self, name: &str) -> Option<Value> {
        self.scope.read().await.get_name(name)
    }

    /// Set a global variable.
    pub async fn set_var(&self, name: &str, value: Value) {
        self.scope.read().await.set_global(name, value);
    }

    /// List all variables.
    pub async fn list_vars(&self) -> Vec<(String, Value)> {
        self.scope.read().await.all()
    }

    /// Set a boolean session flag such as `ForceSynchronizeProcessOutput`.
    pub async fn set_flag(&self, name: &str, on: bool) {
        self.set_var(name, Value::from(on)).await;
    }

    /// Register (or replace) a builtin.
    pub fn register_builtin(&self, builtin: impl Builtin + 'static) {
        self.session
            .builtins
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .register(builtin);
    }

    /// Names of every registered builtin.
    pub fn builtin_names(&self) -> Vec<String> {
        self.session
            .builtins
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .names()
            .to_vec()
    }

    /// Forget every variable and function.
    pub async fn reset(&self) -> Result<()> {
        let mut scope = self.scope.write().await;
        *scope = Scope::new();
        init_scope(&scope, self.force_sync_process_output);
        Ok(())
    }
}

fn init_scope(scope: &Scope, force_sync_process_output: bool) {
    scope.set_global(FORCE_SYNC_PROCESS_OUTPUT, Value::from(force_sync_process_output));
}

/// Report a record the way the REPL and the script runner print it.
pub fn describe_record(record: &ErrorRecord) -> String {
    format!("{}: {}", record.category, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn variables_survive_between_runs() {
        let kernel = Kernel::new(KernelConfig::named("test")).unwrap();
        kernel.execute("$x = 41").await.unwrap();
        let result = kernel.execute("$x + 1").await.unwrap();
        assert_eq!(result.output_strings(), ["42"]);

        kernel.set_var("greeting", Value::from("hi")).await;
        assert_eq!(kernel.get_var("GREETING").await, Some(Value::from("hi")));

        kernel.reset().await.unwrap();
        assert!(kernel.get_var("x").await.is_none());
        assert_eq!(
            kernel.get_var(FORCE_SYNC_PROCESS_OUTPUT).await,
            Some(Value::from(false))
        );
    }

    #[tokio::test]
    async fn parse_errors_are_err() {
        let kernel = Kernel::new(KernelConfig::default()).unwrap();
        let err = kernel.execute("(1 +").await.unwrap_err();
        assert!(err.downcast_ref::<KernelError>().is_some());
    }

    #[tokio::test]
    async fn streaming_sees_values_in_order() {
        let kernel = Kernel::new(KernelConfig::default()).unwrap();
        let mut seen = Vec::new();
        kernel
            .execute_streaming("1..3 | ForEach-Object { $_ * 10 }", &mut |v| seen.push(v.to_string()))
            .await
            .unwrap();
        assert_eq!(seen, ["10", "20", "30"]);
    }

    #[tokio::test]
    async fn a_cancelled_token_is_replaced() {
        let kernel = Kernel::new(KernelConfig::default()).unwrap();
        let first = kernel.cancel_token();
        kernel.cancel();
        assert!(first.is_cancelled());
        assert!(!kernel.cancel_token().is_cancelled());
        let result = kernel.execute("'still runs'").await.unwrap();
        assert_eq!(result.output_strings(), ["still runs"]);
    }
}
