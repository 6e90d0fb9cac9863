//! External programs as pipeline stages.
//!
//! Input values are written to the child's stdin one per line. Its stdout
//! comes back as one string value per line, streamed while the program
//! runs, or, with `$ForceSynchronizeProcessOutput` set, emitted only after
//! it exits. stderr goes to the terminal.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::interpreter::{EvalResult, Fail, Scope, LAST_EXIT_CODE};
use crate::scheduler::Streams;

use super::Lifecycle;

/// Join arguments into one command line.
///
/// An argument containing a space is wrapped in double quotes unless it
/// already starts with one.
pub fn quote_arguments(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(' ') && !arg.starts_with('"') {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exit code, or `128 + signal` for a program killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            128 + status.signal().unwrap_or(0)
        }
        #[cfg(not(unix))]
        {
            -1
        }
    })
}

fn process_error(name: &str, message: String) -> ErrorRecord {
    ErrorRecord::new(ErrorCategory::ExternalProcess, message).with_target(name)
}

pub struct ExternalProcessAdapter {
    name: String,
    path: PathBuf,
    args: Vec<String>,
    /// Collect output until exit instead of streaming it.
    force_sync: bool,
    scope: Scope,
    cancel: CancellationToken,
    has_input: bool,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    lines: Option<mpsc::UnboundedReceiver<String>>,
}

impl ExternalProcessAdapter {
    pub fn new(
        name: String,
        path: PathBuf,
        args: Vec<String>,
        force_sync: bool,
        scope: Scope,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            path,
            args,
            force_sync,
            scope,
            cancel,
            has_input: false,
            child: None,
            stdin: None,
            lines: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit whatever output lines have arrived, without waiting.
    async fn emit_ready(&mut self, streams: &mut Streams) -> EvalResult<()> {
        if self.force_sync {
            return Ok(());
        }
        let mut ready = Vec::new();
        if let Some(lines) = self.lines.as_mut() {
            while let Ok(line) = lines.try_recv() {
                ready.push(line);
            }
        }
        for line in ready {
            streams.output.emit(Value::from(line), &self.cancel).await?;
        }
        Ok(())
    }

    /// Emit every remaining line until the child closes stdout.
    async fn emit_rest(&mut self, streams: &mut Streams) -> EvalResult<()> {
        let Some(mut lines) = self.lines.take() else {
            return Ok(());
        };
        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Fail::Stopped),
                line = lines.recv() => line,
            };
            match line {
                Some(line) => streams.output.emit(Value::from(line), &self.cancel).await?,
                None => return Ok(()),
            }
        }
    }

    async fn wait(&mut self) -> EvalResult<i32> {
        let Some(child) = self.child.as_mut() else {
            return Ok(0);
        };
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Fail::Stopped),
            status = child.wait() => status,
        };
        status
            .map(exit_code)
            .map_err(|e| process_error(&self.name, format!("{}: failed to wait: {}", self.name, e)).into())
    }
}

#[async_trait]
impl Lifecycle for ExternalProcessAdapter {
    async fn prepare(&mut self, has_input: bool) -> EvalResult<()> {
        self.has_input = has_input;
        tracing::debug!(
            program = %self.path.display(),
            command_line = %quote_arguments(&self.args),
            force_sync = self.force_sync,
            "prepared external command"
        );
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(program = %self.name))]
    async fn begin(&mut self, _streams: &mut Streams) -> EvalResult<()> {
        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .envs(self.scope.env_overrides())
            .stdin(if self.has_input { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| process_error(&self.name, format!("{}: {}", self.name, e)).terminating())?;

        self.stdin = child.stdin.take();
        if let Some(stdout) = child.stdout.take() {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
            self.lines = Some(rx);
        }
        self.child = Some(child);
        Ok(())
    }

    async fn process(&mut self, input: Option<Value>, streams: &mut Streams) -> EvalResult<()> {
        if let (Some(value), Some(stdin)) = (input, self.stdin.as_mut()) {
            let line = format!("{}\n", value);
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Fail::Stopped),
                written = stdin.write_all(line.as_bytes()) => written,
            };
            if let Err(e) = written {
                // the program stopped reading; the rest of the input is dropped
                tracing::debug!(program = %self.name, error = %e, "stdin closed");
                self.stdin = None;
            }
        }
        self.emit_ready(streams).await
    }

    async fn end(&mut self, streams: &mut Streams) -> EvalResult<()> {
        // EOF for the child
        self.stdin = None;

        let code = if self.force_sync {
            let code = self.wait().await?;
            self.emit_rest(streams).await?;
            code
        } else {
            self.emit_rest(streams).await?;
            self.wait().await?
        };

        tracing::debug!(program = %self.name, code, "external command exited");
        self.scope.set_global(LAST_EXIT_CODE, Value::from(code));
        if code != 0 {
            streams.errors.write(process_error(
                &self.name,
                format!("Program '{}' exited with code {}", self.name, code),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{error_stream, Emitter};

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quoting() {
        assert_eq!(
            quote_arguments(&strings(&["a b", "\"c d\"", "e"])),
            "\"a b\" \"c d\" e"
        );
        assert_eq!(quote_arguments(&[]), "");
        assert_eq!(quote_arguments(&strings(&["plain"])), "plain");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_lines_and_records_exit_code() {
        let scope = Scope::new();
        let mut adapter = ExternalProcessAdapter::new(
            "sh".to_string(),
            PathBuf::from("/bin/sh"),
            strings(&["-c", "echo one; echo two; exit 3"]),
            false,
            scope.clone(),
            CancellationToken::new(),
        );
        let (errors, mut receiver) = error_stream();
        let mut streams = Streams::new(Emitter::collect(), errors);

        adapter.prepare(false).await.unwrap();
        adapter.begin(&mut streams).await.unwrap();
        adapter.process(None, &mut streams).await.unwrap();
        adapter.end(&mut streams).await.unwrap();

        let out: Vec<String> = streams.output.take_collected().iter().map(Value::to_string).collect();
        assert_eq!(out, ["one", "two"]);
        assert_eq!(scope.get_name(LAST_EXIT_CODE), Some(Value::from(3)));
        let records = receiver.drain();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, ErrorCategory::ExternalProcess);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn input_goes_to_stdin() {
        let mut adapter = ExternalProcessAdapter::new(
            "cat".to_string(),
            PathBuf::from("/bin/cat"),
            vec![],
            true,
            Scope::new(),
            CancellationToken::new(),
        );
        let (errors, _receiver) = error_stream();
        let mut streams = Streams::new(Emitter::collect(), errors);

        adapter.prepare(true).await.unwrap();
        adapter.begin(&mut streams).await.unwrap();
        for n in 1..=3 {
            adapter.process(Some(Value::from(n)), &mut streams).await.unwrap();
        }
        assert!(streams.output.take_collected().is_empty());
        adapter.end(&mut streams).await.unwrap();

        let out: Vec<String> = streams.output.take_collected().iter().map(Value::to_string).collect();
        assert_eq!(out, ["1", "2", "3"]);
    }
}
