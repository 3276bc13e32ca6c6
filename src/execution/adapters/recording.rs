//! In-process dispatcher that records assignments instead of launching
//! workers.
//!
//! Used by tests and local runs where a harness plays the worker role by
//! calling the queue service directly.

use crate::execution::{
    domain::ExecutionId,
    ports::{DispatchError, DispatchResult, WorkerAssignment, WorkerDispatcher},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// Dispatcher that keeps every accepted assignment.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    assignments: Arc<Mutex<Vec<WorkerAssignment>>>,
    saturated: Arc<AtomicBool>,
}

impl RecordingDispatcher {
    /// Creates a dispatcher that accepts every assignment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent dispatches fail with [`DispatchError::NoCapacity`]
    /// while `saturated` is set.
    pub fn set_saturated(&self, saturated: bool) {
        self.saturated.store(saturated, Ordering::SeqCst);
    }

    /// Returns the assignments accepted so far, oldest first.
    #[must_use]
    pub fn assignments(&self) -> Vec<WorkerAssignment> {
        self.assignments
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Returns the cancellation token handed out for an execution.
    #[must_use]
    pub fn token_for(&self, execution_id: ExecutionId) -> Option<CancellationToken> {
        self.assignments()
            .into_iter()
            .find(|assignment| assignment.execution_id == execution_id)
            .map(|assignment| assignment.cancellation)
    }
}

impl WorkerDispatcher for RecordingDispatcher {
    fn dispatch(&self, assignment: WorkerAssignment) -> DispatchResult<()> {
        if self.saturated.load(Ordering::SeqCst) {
            return Err(DispatchError::NoCapacity);
        }
        let mut guard = self
            .assignments
            .lock()
            .map_err(|err| DispatchError::launch(std::io::Error::other(err.to_string())))?;
        guard.push(assignment);
        Ok(())
    }
}
