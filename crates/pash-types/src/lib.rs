//! Pure data types for pash: runtime values, error records, pipeline results.
//!
//! This crate is a leaf dependency with no async runtime, no parser, no I/O.
//! Hosts that only need to inspect what a pipeline produced can depend on it
//! without pulling in pash-kernel's runtime.

pub mod error;
pub mod number;
pub mod result;
pub mod value;

// Flat re-exports for convenience
pub use error::*;
pub use number::*;
pub use result::*;
pub use value::*;
