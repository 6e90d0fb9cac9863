//! pash REPL: interactive shell and script runner for the pash kernel.
//!
//! This REPL provides an interactive interface to the pash kernel.
//! It handles:
//! - Meta-commands: `/help`, `/quit`, `/ast`, `/vars`, `/builtins`, `/json`, `/sync`, `/reset`
//! - Script execution via the Kernel, with Ctrl-C stopping the running pipeline
//! - Result formatting (text or JSON)
//! - Command history via rustyline

pub mod format;

use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::runtime::Runtime;

use pash_kernel::ast::sexpr::format_program;
use pash_kernel::{Kernel, KernelConfig, PipelineResult, FORCE_SYNC_PROCESS_OUTPUT};

use format::{detect_context, format_result, OutputMode};

/// What a line of input asks the REPL to do next.
#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    /// Nothing to print.
    Silent,
    /// Print this and read the next line.
    Print(String),
    /// Leave the REPL.
    Exit,
}

/// REPL configuration and state.
pub struct Repl {
    kernel: Kernel,
    runtime: Runtime,
    show_ast: bool,
    mode: OutputMode,
}

impl Repl {
    /// Create a new REPL with the interactive kernel configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(KernelConfig::repl())
    }

    /// Create a new REPL with a custom kernel configuration.
    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let kernel = Kernel::new(config).context("Failed to create kernel")?;
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;

        Ok(Self {
            kernel,
            runtime,
            show_ast: false,
            mode: OutputMode::Text,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Process a single line (or block) of input.
    pub fn process_line(&mut self, line: &str) -> Result<LineOutcome> {
        let trimmed = line.trim();

        if trimmed.starts_with('/') {
            return self.handle_meta_command(trimmed);
        }
        if let Some(outcome) = self.try_shell_style_command(trimmed)? {
            return Ok(outcome);
        }
        if trimmed.is_empty() {
            return Ok(LineOutcome::Silent);
        }

        if self.show_ast {
            return Ok(LineOutcome::Print(match pash_kernel::parser::parse(trimmed) {
                Ok(program) => format_program(&program),
                Err(errors) => {
                    let mut msg = String::from("Parse error:");
                    for err in errors {
                        let (line, col) = err.line_col(trimmed);
                        msg.push_str(&format!("\n  {}:{}: {}", line, col, err.message));
                    }
                    msg
                }
            }));
        }

        let result = match self.execute(trimmed) {
            Ok(result) => result,
            Err(e) => return Ok(LineOutcome::Print(format!("Error: {:#}", e))),
        };
        let text = format_result(&result, self.mode, detect_context())?;
        Ok(if text.is_empty() {
            LineOutcome::Silent
        } else {
            LineOutcome::Print(text)
        })
    }

    /// Run source to completion. Ctrl-C stops the running pipeline rather
    /// than the REPL.
    pub fn execute(&self, source: &str) -> Result<PipelineResult> {
        let token = self.kernel.cancel_token();
        self.runtime.block_on(async {
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });
            let result = self.kernel.execute(source).await;
            watcher.abort();
            result
        })
    }

    /// Handle a meta-command (starts with /).
    fn handle_meta_command(&mut self, cmd: &str) -> Result<LineOutcome> {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        let command = parts.first().copied().unwrap_or("");

        let text = match command {
            "/quit" | "/q" | "/exit" => return Ok(LineOutcome::Exit),
            "/help" | "/h" | "/?" => HELP_TEXT.to_string(),
            "/ast" => {
                self.show_ast = !self.show_ast;
                format!("AST mode: {}", on_off(self.show_ast))
            }
            "/json" => {
                self.mode = match self.mode {
                    OutputMode::Text => OutputMode::Json,
                    OutputMode::Json => OutputMode::Text,
                };
                format!("JSON output: {}", on_off(self.mode == OutputMode::Json))
            }
            "/sync" => {
                let current = self
                    .runtime
                    .block_on(self.kernel.get_var(FORCE_SYNC_PROCESS_OUTPUT))
                    .map(|v| v.is_truthy())
                    .unwrap_or(false);
                self.runtime
                    .block_on(self.kernel.set_flag(FORCE_SYNC_PROCESS_OUTPUT, !current));
                format!("Synchronous process output: {}", on_off(!current))
            }
            "/scope" | "/vars" => {
                let mut vars = self.runtime.block_on(self.kernel.list_vars());
                if vars.is_empty() {
                    "(no variables set)".to_string()
                } else {
                    vars.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));
                    let mut output = String::from("Variables:");
                    for (name, value) in vars {
                        output.push_str(&format!("\n  ${} = {}", name, value));
                    }
                    output
                }
            }
            "/builtins" | "/tools" => {
                format!("Builtins: {}", self.kernel.builtin_names().join(", "))
            }
            "/state" | "/session" => {
                let vars = self.runtime.block_on(self.kernel.list_vars());
                format!("Kernel: {}\nVariables: {}", self.kernel.name(), vars.len())
            }
            "/reset" => {
                self.runtime
                    .block_on(self.kernel.reset())
                    .context("Reset failed")?;
                "Session reset (variables and functions cleared)".to_string()
            }
            _ => format!(
                "Unknown command: {}\nType /help for available commands.",
                command
            ),
        };
        Ok(LineOutcome::Print(text))
    }

    /// Shell-style spellings of the common meta-commands.
    fn try_shell_style_command(&mut self, cmd: &str) -> Result<Option<LineOutcome>> {
        let meta = match cmd {
            "quit" | "exit" => "/quit",
            "help" => "/help",
            _ => return Ok(None),
        };
        self.handle_meta_command(meta).map(Some)
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

const HELP_TEXT: &str = r#"pash REPL

Meta Commands:
  help, /help, /?   Show this help
  quit, /quit, /q   Exit the REPL

Slash-only commands:
  /ast              Toggle AST display mode
  /json             Toggle JSON output
  /sync             Toggle $ForceSynchronizeProcessOutput
  /vars             Show all variables
  /builtins         List builtin commands
  /state            Show session info
  /reset            Clear variables and functions

Builtins:
  Write-Output (echo, write)     Write-Error
  ForEach-Object (foreach, %)    Where-Object (where, ?)
  Select-Object (select)         Sort-Object (sort)
  Measure-Object (measure)       Out-Null, Out-String

External Commands:
  Names that are not functions or builtins are searched in PATH.
  Values piped into a program are written to its stdin, one per line;
  each line it prints comes back as a string.

Language:
  $x = 1, 2, 3                 Arrays
  $h = @{ Name = 'pash' }      Hashtables
  1..10 | % { $_ * 2 }         Pipelines with script blocks
  function Add($a, $b) { $a + $b }
  if ($x -gt 1) { } elseif ($x) { } else { }
  foreach ($i in $xs) { }      while ($c) { }    for ($i = 0; $i -lt 3; $i += 1) { }
  try { throw 'x' } catch { $_ } finally { }
  [Math]::Sqrt(16)             Static members

Ctrl-C stops the running pipeline; Ctrl-D exits.
"#;

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, history_path: &Option<PathBuf>) {
    if let Some(path) = history_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create history directory: {}", e);
            }
        }
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }
}

/// Whether a buffered block still has unclosed brackets and needs more lines.
pub fn needs_more_input(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut quote: Option<char> = None;
    for c in source.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' | '(' => depth += 1,
                '}' | ')' => depth -= 1,
                _ => {}
            },
        }
    }
    depth > 0 || quote.is_some()
}

/// Run the REPL.
pub fn run() -> Result<()> {
    println!("pash v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.");

    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;

    let history_path =
        directories::BaseDirs::new().map(|b| b.data_dir().join("pash").join("history.txt"));
    if let Some(ref path) = history_path {
        if let Err(e) = rl.load_history(path) {
            // Missing on first run
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                tracing::warn!("Failed to load history: {}", e);
            }
        }
    }

    let mut repl = Repl::new()?;
    println!();

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "pash> " } else { "  ... " };

        match rl.readline(prompt) {
            Ok(line) => {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);
                if needs_more_input(&buffer) {
                    continue;
                }
                let block = std::mem::take(&mut buffer);
                if let Err(e) = rl.add_history_entry(block.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(&block) {
                    Ok(LineOutcome::Print(output)) => println!("{}", output),
                    Ok(LineOutcome::Silent) => {}
                    Ok(LineOutcome::Exit) => break,
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    save_history(&mut rl, &history_path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_brackets_continue_the_block() {
        assert!(needs_more_input("function F {"));
        assert!(needs_more_input("if ($x"));
        assert!(needs_more_input("'unterminated"));
        assert!(!needs_more_input("function F { '{' }"));
        assert!(!needs_more_input("1 + 2"));
    }
}
