//! Pipeline execution for pash.
//!
//! Every command in a pipeline runs as its own task. Stage `i` writes into
//! a bounded channel that stage `i + 1` reads, so a slow consumer suspends
//! its producer once the channel fills. The last stage's channel is drained
//! here, on the caller's task, into the caller's output stream.

use pash_types::{ErrorCategory, ErrorRecord, PipelineState, Value};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::interpreter::{EvalResult, Fail};
use crate::processor::{CommandProcessor, Lifecycle};

use super::emitter::{Emitter, Streams};

/// Where a stage's input comes from.
enum StageInput {
    /// First stage with nothing piped in: `process` runs once with no input.
    Nothing,
    /// First stage fed by a leading expression.
    Values(Vec<Value>),
    Channel(mpsc::Receiver<Value>),
}

/// Runs one pipeline and tracks its state.
#[derive(Debug)]
pub struct PipelineExecutor {
    capacity: usize,
    state: PipelineState,
    /// Inside `try`: a stage's non-terminating records unwind instead of
    /// going to the error stream.
    promote_errors: bool,
}

impl PipelineExecutor {
    /// Create an executor whose inter-stage channels hold `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: PipelineState::Created,
            promote_errors: false,
        }
    }

    pub fn with_promoted_errors(mut self, promote: bool) -> Self {
        self.promote_errors = promote;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_become(next),
            "invalid pipeline transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }

    /// Run `stages` to completion.
    ///
    /// `feed` holds the values of a leading expression, if any. Output of
    /// the last stage goes to `streams.output`; every stage shares
    /// `streams.errors`.
    ///
    /// A non-terminating record raised by a stage goes to `streams.errors`
    /// and the stage moves on to its next input. A terminating record (or
    /// any record, when errors are promoted) stops the other stages and is
    /// returned unchanged. Cancellation stops every stage and returns
    /// [`Fail::Stopped`].
    #[tracing::instrument(level = "debug", skip_all, fields(stages = stages.len()))]
    pub async fn run(
        &mut self,
        mut stages: Vec<CommandProcessor>,
        feed: Option<Vec<Value>>,
        streams: &mut Streams,
        cancel: &CancellationToken,
    ) -> EvalResult<PipelineState> {
        self.transition(PipelineState::Running);

        if stages.is_empty() {
            if let Some(values) = feed {
                for value in values {
                    if let Err(fail) = streams.output.emit(value, cancel).await {
                        return Err(self.unwind(fail));
                    }
                }
            }
            self.transition(PipelineState::Completed);
            return Ok(self.state);
        }

        let fed = feed.is_some();
        for (i, stage) in stages.iter_mut().enumerate() {
            if let Err(fail) = stage.prepare(i > 0 || fed).await {
                return Err(self.unwind(fail));
            }
        }

        let mut tasks = JoinSet::new();
        let mut input = match feed {
            Some(values) => StageInput::Values(values),
            None => StageInput::Nothing,
        };
        for stage in stages {
            let (tx, rx) = mpsc::channel(self.capacity);
            let stage_streams = Streams::new(Emitter::Channel(tx), streams.errors.clone());
            tasks.spawn(drive_stage(
                stage,
                input,
                stage_streams,
                cancel.clone(),
                self.promote_errors,
            ));
            input = StageInput::Channel(rx);
        }
        let StageInput::Channel(mut last) = input else {
            unreachable!("at least one stage was spawned");
        };

        let mut draining = true;
        while draining || !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    return Err(self.unwind(Fail::Stopped));
                }
                item = last.recv(), if draining => match item {
                    Some(value) => {
                        if let Err(fail) = streams.output.emit(value, cancel).await {
                            tasks.shutdown().await;
                            return Err(self.unwind(fail));
                        }
                    }
                    None => draining = false,
                },
                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let outcome = match joined {
                        Some(Ok(outcome)) => outcome,
                        Some(Err(err)) => Err(Fail::Error(
                            ErrorRecord::new(
                                ErrorCategory::Runtime,
                                format!("pipeline stage panicked: {}", err),
                            )
                            .terminating(),
                        )),
                        None => Ok(()),
                    };
                    if let Err(fail) = outcome {
                        tasks.shutdown().await;
                        return Err(self.unwind(fail));
                    }
                }
            }
        }

        self.transition(PipelineState::Completed);
        Ok(self.state)
    }

    fn unwind(&mut self, fail: Fail) -> Fail {
        match &fail {
            Fail::Error(record) if record.terminating => {
                tracing::debug!(category = %record.category, "pipeline failed");
                self.transition(PipelineState::Failed);
            }
            // unwinding to a `try`, or a stage that could not be prepared
            Fail::Error(_) => self.transition(PipelineState::Completed),
            Fail::Stopped | Fail::OutputClosed => self.transition(PipelineState::Stopped),
        }
        fail
    }
}

/// Drive one stage through begin, process and end.
async fn drive_stage(
    mut stage: CommandProcessor,
    input: StageInput,
    mut streams: Streams,
    cancel: CancellationToken,
    promote_errors: bool,
) -> EvalResult<()> {
    let outcome = run_phases(&mut stage, input, &mut streams, &cancel, promote_errors).await;
    match outcome {
        // whoever reads our output went away; that ends this stage quietly
        Err(Fail::OutputClosed) => Ok(()),
        other => other,
    }
}

async fn run_phases(
    stage: &mut CommandProcessor,
    input: StageInput,
    streams: &mut Streams,
    cancel: &CancellationToken,
    promote: bool,
) -> EvalResult<()> {
    let outcome = stage.begin(streams).await;
    absorb(outcome, promote, streams)?;
    match input {
        StageInput::Nothing => {
            let outcome = stage.process(None, streams).await;
            absorb(outcome, promote, streams)?;
        }
        StageInput::Values(values) => {
            for value in values {
                check(cancel)?;
                let outcome = stage.process(Some(value), streams).await;
                absorb(outcome, promote, streams)?;
            }
        }
        StageInput::Channel(mut rx) => loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Fail::Stopped),
                item = rx.recv() => item,
            };
            match item {
                Some(value) => {
                    let outcome = stage.process(Some(value), streams).await;
                    absorb(outcome, promote, streams)?;
                }
                None => break,
            }
        },
    }
    let outcome = stage.end(streams).await;
    absorb(outcome, promote, streams)
}

/// Record a non-terminating failure and let the stage carry on, unless
/// errors are being promoted to an enclosing `try`.
fn absorb(outcome: EvalResult<()>, promote: bool, streams: &Streams) -> EvalResult<()> {
    match outcome {
        Err(Fail::Error(record)) if !record.terminating && !promote => {
            streams.errors.write(record);
            Ok(())
        }
        other => other,
    }
}

fn check(cancel: &CancellationToken) -> EvalResult<()> {
    if cancel.is_cancelled() {
        Err(Fail::Stopped)
    } else {
        Ok(())
    }
}
