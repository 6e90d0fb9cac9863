//! pash CLI entry point.
//!
//! Usage:
//!   pash                       # Interactive REPL
//!   pash -c <command>          # Execute command and exit
//!   pash script.ps1            # Run a script
//!   pash --json -c <command>   # Print the result as JSON

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pash_kernel::format::render_lines;
use pash_kernel::{describe_record, Kernel, KernelConfig, PipelineResult, PipelineState};
use pash_repl::format::{detect_context, format_result, OutputMode};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let mode = match args.iter().position(|a| a == "--json") {
        Some(index) => {
            args.remove(index);
            OutputMode::Json
        }
        None => OutputMode::Text,
    };

    match args.first().map(|s| s.as_str()) {
        None => {
            pash_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("pash {} ({} {})",
                     env!("CARGO_PKG_VERSION"),
                     env!("PASH_GIT_HASH"),
                     env!("PASH_BUILD_DATE"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let cmd = args.get(1)
                .context("-c requires a command argument")?;
            run_source(cmd, mode)
        }

        Some(path) if !path.starts_with('-') => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script: {path}"))?;

            // Skip shebang if present
            let source = if source.starts_with("#!") {
                source.lines().skip(1).collect::<Vec<_>>().join("\n")
            } else {
                source
            };
            run_source(&source, mode)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'pash --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(r#"pash v{}

Usage:
  pash                         Interactive REPL
  pash -c <command>            Execute command and exit
  pash <script.ps1>            Run a script file

Options:
  -c <command>                 Execute command string and exit
  --json                       Print the pipeline result as JSON
  -h, --help                   Show this help
  -V, --version                Show version

Environment:
  RUST_LOG                     Tracing filter, e.g. RUST_LOG=pash_kernel=debug

Examples:
  pash                         # Start interactive REPL
  pash -c '1..5 | % {{ $_ * 2 }}'
  pash -c '"red" * 3'
  pash build.ps1               # Run a script
"#, env!("CARGO_PKG_VERSION"));
}

/// Run source to completion outside the REPL.
///
/// In text mode values are printed as they arrive and error records go to
/// stderr. In JSON mode the whole result is printed once at the end.
fn run_source(source: &str, mode: OutputMode) -> Result<ExitCode> {
    let kernel = Kernel::new(KernelConfig::named("script"))
        .context("Failed to create kernel")?;
    let rt = tokio::runtime::Runtime::new()?;

    let result = match mode {
        OutputMode::Text => {
            let result = rt.block_on(kernel.execute_streaming(source, &mut |value| {
                for line in render_lines(std::slice::from_ref(value)) {
                    println!("{line}");
                }
            }))?;
            for record in result.errors.iter().chain(result.failure.iter()) {
                eprintln!("{}", describe_record(record));
            }
            result
        }
        OutputMode::Json => {
            let result = rt.block_on(kernel.execute(source))?;
            println!("{}", format_result(&result, mode, detect_context())?);
            result
        }
    };

    Ok(exit_code(&result))
}

fn exit_code(result: &PipelineResult) -> ExitCode {
    match result.state {
        PipelineState::Completed if result.errors.is_empty() => ExitCode::SUCCESS,
        PipelineState::Stopped => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    }
}
