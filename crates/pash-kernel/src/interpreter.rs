//! Interpreter module for pash.
//!
//! Evaluates statements and expressions, owns the scope chain and the
//! member-access rules shared by the evaluator and the builtins.
//!
//! # Architecture
//!
//! - **Scope**: frames of case-insensitive variables and functions
//! - **Evaluator**: walks the AST, writing output to [`Streams`](crate::scheduler::Streams)
//! - **Flow / Fail**: how a statement finished, or why evaluation unwound
//! - **members**: properties, methods and indexing on values
//!
//! # Example
//!
//! ```
//! use pash_kernel::interpreter::Scope;
//! use pash_kernel::ast::VarRef;
//! use pash_types::Value;
//!
//! let scope = Scope::new();
//! scope.set(&VarRef::new("X"), Value::from(42));
//! assert_eq!(scope.get(&VarRef::new("x")), Some(Value::from(42)));
//! ```

mod control_flow;
mod eval;
pub mod members;
mod scope;

pub use control_flow::{EvalResult, Fail, Flow};
pub use eval::{script_block_ast, script_block_value, Evaluator, Session, DEFAULT_CHANNEL_CAPACITY};
pub use scope::{Scope, FORCE_SYNC_PROCESS_OUTPUT, LAST_EXIT_CODE};
