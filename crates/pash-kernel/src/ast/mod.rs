//! Abstract syntax tree for pash scripts.

pub mod sexpr;
mod types;

pub use types::*;
