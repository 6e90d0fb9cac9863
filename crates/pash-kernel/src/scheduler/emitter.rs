//! Success-stream writers.
//!
//! Evaluation code never knows where its output goes. It writes to an
//! [`Emitter`], which either collects values (assignments, subexpressions,
//! top-level runs), forwards them into the bounded channel feeding the next
//! pipeline stage, or drops them.

use pash_types::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error_stream::ErrorStream;
use crate::interpreter::{EvalResult, Fail};

/// Where emitted values go.
#[derive(Debug)]
pub enum Emitter {
    Collect(Vec<Value>),
    /// Bounded hop to the next stage. A full channel suspends the writer.
    Channel(mpsc::Sender<Value>),
    Discard,
}

impl Emitter {
    pub fn collect() -> Self {
        Emitter::Collect(Vec::new())
    }

    /// Emit a single value as-is.
    pub async fn emit(&mut self, value: Value, cancel: &CancellationToken) -> EvalResult<()> {
        match self {
            Emitter::Collect(values) => {
                values.push(value);
                Ok(())
            }
            Emitter::Channel(sender) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Fail::Stopped),
                    sent = sender.send(value) => sent.map_err(|_| Fail::OutputClosed),
                }
            }
            Emitter::Discard => Ok(()),
        }
    }

    /// Write a statement result: sequences are unrolled one level.
    pub async fn write(&mut self, value: Value, cancel: &CancellationToken) -> EvalResult<()> {
        if value.as_sequence().is_some() {
            for item in value.unroll() {
                self.emit(item, cancel).await?;
            }
            Ok(())
        } else {
            self.emit(value, cancel).await
        }
    }

    /// Take what a collecting emitter has gathered.
    pub fn take_collected(&mut self) -> Vec<Value> {
        match self {
            Emitter::Collect(values) => std::mem::take(values),
            _ => Vec::new(),
        }
    }
}

/// The pair of streams every piece of evaluation writes to.
#[derive(Debug)]
pub struct Streams {
    pub output: Emitter,
    pub errors: ErrorStream,
}

impl Streams {
    pub fn new(output: Emitter, errors: ErrorStream) -> Self {
        Self { output, errors }
    }

    /// Collecting output, errors forwarded to `errors`.
    pub fn collecting(errors: &ErrorStream) -> Self {
        Self::new(Emitter::collect(), errors.clone())
    }
}

/// Fold collected output the way assignment does: nothing is `$null`, one
/// value is itself, more is a sequence.
pub fn collapse(mut values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::null(),
        1 => values.pop().unwrap_or_default(),
        _ => Value::sequence(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::error_stream::error_stream;

    #[tokio::test]
    async fn write_unrolls_one_level() {
        let cancel = CancellationToken::new();
        let mut out = Emitter::collect();
        let inner = Value::sequence(vec![Value::from(2), Value::from(3)]);
        let outer = Value::sequence(vec![Value::from(1), inner]);
        out.write(outer, &cancel).await.unwrap();

        let values = out.take_collected();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].count(), 2);
    }

    #[tokio::test]
    async fn closed_channel_reports_output_closed() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut out = Emitter::Channel(tx);
        assert!(matches!(
            out.emit(Value::from(1), &cancel).await,
            Err(Fail::OutputClosed)
        ));
    }

    #[tokio::test]
    async fn cancel_unblocks_a_full_channel() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);
        let mut out = Emitter::Channel(tx);
        out.emit(Value::from(1), &cancel).await.unwrap();
        cancel.cancel();
        assert!(matches!(
            out.emit(Value::from(2), &cancel).await,
            Err(Fail::Stopped)
        ));
    }

    #[test]
    fn collapse_rules() {
        assert!(collapse(vec![]).is_null());
        assert_eq!(collapse(vec![Value::from(1)]), Value::from(1));
        assert_eq!(collapse(vec![Value::from(1), Value::from(2)]).count(), 2);
        let (errors, _rx) = error_stream();
        let streams = Streams::collecting(&errors);
        assert!(matches!(streams.output, Emitter::Collect(_)));
    }
}
