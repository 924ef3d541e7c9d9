// Path: crates/consensus/src/timer.rs
//! The cancellable vote-step timer.
//!
//! Holds the round's scheduled voting walk; denying the timer aborts the
//! walk, and a pending step observes the abort instead of doing I/O.

use std::sync::Mutex;
use tokio::task::JoinHandle;

/// Owns at most one scheduled voting walk.
#[derive(Default)]
pub struct Timer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Creates an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the walk for the new round, cancelling any previous one.
    pub fn schedule(&self, handle: JoinHandle<()>) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    /// Cancels the pending walk; a no-op when nothing is scheduled.
    pub fn deny(&self) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.deny();
    }
}
