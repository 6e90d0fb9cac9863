//! pash-kernel: the core of the pash object shell.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes pash source code using logos
//! - **Parser**: Builds AST from tokens using chumsky
//! - **AST**: Type definitions for the abstract syntax tree
//! - **Ops**: Operator resolution and numeric type promotion
//! - **Interpreter**: Expression evaluation, scopes, and control flow
//! - **Dispatch**: Function, builtin and external command resolution
//! - **Processor**: The begin/process/end lifecycle of every command kind
//! - **Scheduler**: Bounded-channel pipeline execution and the error stream
//! - **Tools**: Builtin trait, registry, and the standard cmdlets
//! - **Host**: Static members such as `[Math]::Sqrt`

pub mod ast;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod host;
pub mod interpreter;
pub mod kernel;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod processor;
pub mod scheduler;
pub mod tools;

pub use error::KernelError;
pub use host::{HostCapability, NullHost, StandardHost};
pub use kernel::{describe_record, Kernel, KernelConfig};
pub use processor::quote_arguments;

// ═══════════════════════════════════════════════════════════════════════════
// Embedding Conveniences
// ═══════════════════════════════════════════════════════════════════════════

// Result types, so embedders need not depend on pash-types directly
pub use pash_types::{ErrorCategory, ErrorRecord, PipelineResult, PipelineState, Value};

// Session flags
pub use interpreter::{FORCE_SYNC_PROCESS_OUTPUT, LAST_EXIT_CODE};
