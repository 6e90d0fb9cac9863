//! Scheduler module for pash: object pipelines and their streams.
//!
//! This module provides:
//! - **Pipeline execution**: every command runs as its own task, connected
//!   to the next by a bounded channel of values.
//! - **Streams**: the success stream ([`Emitter`]) and the shared error
//!   stream ([`ErrorStream`]) every stage writes to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PipelineExecutor                            │
//! │  ┌─────────┐  bounded   ┌─────────┐  bounded   ┌─────────┐       │
//! │  │ stage 1 │───────────▶│ stage 2 │───────────▶│ stage 3 │──▶ out│
//! │  │ (task)  │   Value    │ (task)  │   Value    │ (task)  │       │
//! │  └────┬────┘            └────┬────┘            └────┬────┘       │
//! │       └───────────────┬──────┴──────────────────────┘            │
//! │                       ▼                                          │
//! │                  ErrorStream                                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! State: `Created → Running → Completed | Failed | Stopped`.

mod emitter;
mod error_stream;
mod pipeline;

pub use emitter::{collapse, Emitter, Streams};
pub use error_stream::{error_stream, ErrorReceiver, ErrorStream};
pub use pipeline::PipelineExecutor;
