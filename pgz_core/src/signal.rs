//! One-shot completion signal between a block worker and the coordinator.
//!
//! Each block gets exactly one [`Completion`] (held by the worker that owns
//! the block) and one [`Awaiter`] (held by the coordinator). Both ends are
//! consumed on use, so a signal can be set at most once and waited on at
//! most once.

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{PgzError, Result};

/// Producer end: fired by the worker once its block is fully written.
#[derive(Debug)]
pub struct Completion<T = u64> {
    tx: Sender<T>,
}

/// Consumer end: blocks the coordinator until the matching worker fires.
#[derive(Debug)]
pub struct Awaiter<T = u64> {
    sequence: u64,
    rx: Receiver<T>,
}

/// Create the two ends of the signal for block `sequence`.
pub fn pair<T>(sequence: u64) -> (Completion<T>, Awaiter<T>) {
    let (tx, rx) = bounded(1);
    (Completion { tx }, Awaiter { sequence, rx })
}

impl<T> Completion<T> {
    /// Hand the finished block's result to the awaiter. Never blocks.
    pub fn notify(self, value: T) {
        // The awaiter is gone only when the coordinator already failed; the
        // run is being torn down and the value has nowhere to go.
        let _ = self.tx.send(value);
    }
}

impl<T> Awaiter<T> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wait for the worker's value.
    ///
    /// Resolves to [`PgzError::Cancelled`] if the `Completion` was dropped
    /// without notifying, which happens when the worker skipped or failed
    /// its block.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| PgzError::Cancelled {
            sequence: self.sequence,
        })
    }
}
