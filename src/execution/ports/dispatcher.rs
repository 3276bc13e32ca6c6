//! Worker dispatch port.
//!
//! A worker is anything that can be launched with an execution identity and
//! later reports logs and a terminal status through the queue service. The
//! manager never knows which scraper implementation sits behind a
//! dispatcher.

use crate::definition::domain::{TargetSite, TaskDefinition, TaskDefinitionId};
use crate::execution::domain::{ExecutionId, TaskExecution, TriggerType};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Everything a worker needs to start one execution.
#[derive(Debug, Clone)]
pub struct WorkerAssignment {
    /// Execution identity the worker reports against.
    pub execution_id: ExecutionId,
    /// Definition being run.
    pub definition_id: TaskDefinitionId,
    /// Definition name, for worker-side diagnostics.
    pub definition_name: String,
    /// Site the worker must scrape.
    pub target_site: TargetSite,
    /// Trigger that produced the execution.
    pub trigger_type: TriggerType,
    /// Fires when the execution is cancelled; workers should poll it or
    /// await it and exit gracefully.
    pub cancellation: CancellationToken,
}

impl WorkerAssignment {
    /// Builds an assignment for a freshly queued execution.
    #[must_use]
    pub fn new(
        execution: &TaskExecution,
        definition: &TaskDefinition,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            execution_id: execution.id(),
            definition_id: definition.id(),
            definition_name: definition.name().as_str().to_owned(),
            target_site: definition.target_site(),
            trigger_type: execution.trigger_type(),
            cancellation,
        }
    }
}

/// Hands executions to workers.
///
/// `dispatch` must not wait for the scrape itself: it returns once the
/// worker has been handed the assignment (or could not be).
#[cfg_attr(test, mockall::automock)]
pub trait WorkerDispatcher: Send + Sync {
    /// Hands one assignment to a worker.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when no worker could take the assignment.
    fn dispatch(&self, assignment: WorkerAssignment) -> DispatchResult<()>;
}

/// Errors returned by dispatcher implementations.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Every worker slot is taken.
    #[error("no worker capacity available")]
    NoCapacity,

    /// No worker is registered for the definition's target site.
    #[error("no worker registered for target site {0}")]
    UnsupportedSite(TargetSite),

    /// The worker could not be launched.
    #[error("worker launch failed: {0}")]
    Launch(Arc<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Wraps a launch failure.
    pub fn launch(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Launch(Arc::new(err))
    }
}

/// A worker process that has gone away.
///
/// Sent by dispatchers that watch their workers. The queue service fails the
/// execution if the worker left it queued or running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    /// Execution the worker was assigned.
    pub execution_id: ExecutionId,
    /// How the worker ended, for the failure log.
    pub description: String,
}
