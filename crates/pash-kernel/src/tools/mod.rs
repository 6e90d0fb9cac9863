//! Builtin commands for pash.
//!
//! Builtins are native commands that take part in pipelines like
//! functions and external programs do. Each declares a [`BuiltinSchema`]
//! and creates a fresh [`BuiltinInstance`] per invocation.
//!
//! # Architecture
//!
//! ```text
//! BuiltinRegistry
//! ├── Write-Output, Write-Error
//! ├── ForEach-Object, Where-Object
//! ├── Select-Object, Sort-Object, Measure-Object
//! └── Out-Null, Out-String
//! ```

mod builtin;
mod context;
mod registry;
mod traits;

pub use builtin::register_builtins;
pub use context::ExecContext;
pub use registry::BuiltinRegistry;
pub use traits::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ParamKind, ParamSchema};
