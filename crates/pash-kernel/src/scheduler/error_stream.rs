//! The error stream shared by every stage of a pipeline.
//!
//! Non-terminating error records do not travel with the success stream.
//! Each stage holds a cloneable [`ErrorStream`] backed by an unbounded mpsc
//! channel; the owner of the matching [`ErrorReceiver`] drains it when the
//! pipeline finishes (or fails).
//!
//! ```text
//!   Stage 1 ──┐
//!   Stage 2 ──┼──▶ ErrorStream (mpsc) ──▶ drain ──▶ caller's error stream
//!   Stage 3 ──┘
//! ```

use pash_types::ErrorRecord;
use tokio::sync::mpsc;

/// Cloneable handle for writing error records.
#[derive(Clone, Debug)]
pub struct ErrorStream {
    sender: mpsc::UnboundedSender<ErrorRecord>,
}

/// Receiving end of an error stream.
#[derive(Debug)]
pub struct ErrorReceiver {
    receiver: mpsc::UnboundedReceiver<ErrorRecord>,
}

/// Create a new error stream pair.
pub fn error_stream() -> (ErrorStream, ErrorReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ErrorStream { sender }, ErrorReceiver { receiver })
}

impl ErrorStream {
    /// Write a record. Never blocks; a dropped receiver discards it.
    pub fn write(&self, record: ErrorRecord) {
        tracing::debug!(category = %record.category, message = %record.message, "error record");
        let _ = self.sender.send(record.non_terminating());
    }
}

impl ErrorReceiver {
    /// Everything written so far, in order.
    pub fn drain(&mut self) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.receiver.try_recv() {
            records.push(record);
        }
        records
    }

    /// Forward everything written so far to another stream.
    pub fn forward_to(&mut self, target: &ErrorStream) {
        for record in self.drain() {
            target.write(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pash_types::ErrorCategory;

    #[test]
    fn drain_keeps_order_and_clears_flags() {
        let (stream, mut receiver) = error_stream();
        let other = stream.clone();
        stream.write(ErrorRecord::new(ErrorCategory::Runtime, "first"));
        other.write(ErrorRecord::thrown("second"));

        let records = receiver.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "first");
        assert!(!records[1].terminating);
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn dropped_receiver_discards() {
        let (stream, receiver) = error_stream();
        drop(receiver);
        stream.write(ErrorRecord::new(ErrorCategory::Runtime, "nobody listening"));
    }
}
