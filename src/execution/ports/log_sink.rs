//! Log sink port for append-only execution logs.

use crate::execution::domain::{ExecutionId, NewLogEntry, TaskLogEntry};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for log sink operations.
pub type LogSinkResult<T> = Result<T, LogSinkError>;

/// Append-only log storage contract.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Appends one entry and returns it with its arrival sequence.
    ///
    /// The sink sets [`TaskLogEntry::post_cancellation`] when the owning
    /// execution is already cancelled at the time of the write.
    ///
    /// # Errors
    ///
    /// Returns [`LogSinkError::UnknownExecution`] without writing anything
    /// when the execution does not exist.
    async fn append(&self, entry: &NewLogEntry) -> LogSinkResult<TaskLogEntry>;

    /// Returns the latest `limit` entries of an execution in
    /// `(timestamp, sequence)` order.
    async fn recent(&self, execution_id: ExecutionId, limit: u32)
    -> LogSinkResult<Vec<TaskLogEntry>>;

    /// Returns every entry of an execution in `(timestamp, sequence)` order.
    async fn list_all(&self, execution_id: ExecutionId) -> LogSinkResult<Vec<TaskLogEntry>>;
}

/// Errors returned by log sink implementations.
#[derive(Debug, Clone, Error)]
pub enum LogSinkError {
    /// The referenced execution does not exist.
    #[error("cannot append log for unknown execution {0}")]
    UnknownExecution(ExecutionId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LogSinkError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
