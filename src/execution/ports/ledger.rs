//! Execution ledger port: the single authority on what is running.

use crate::definition::domain::TaskDefinitionId;
use crate::execution::domain::{
    ExecutionFilter, ExecutionId, ExecutionPage, ExecutionStatus, NewLogEntry, PageRequest,
    SortOrder, TaskExecution,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for execution ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Identity and status of the execution holding a definition's single-flight
/// slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveExecution {
    /// Conflicting execution.
    pub execution_id: ExecutionId,
    /// Its status at the time of the check (`Queued` or `Running`).
    pub status: ExecutionStatus,
}

/// A compare-and-swap status update with an optional log entry written in
/// the same atomic step.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange<'a> {
    /// Execution carrying the new status and timestamps.
    pub execution: &'a TaskExecution,
    /// Status the stored row must still have for the update to apply.
    pub expected: ExecutionStatus,
    /// Entry to append alongside the status change.
    pub log_entry: Option<&'a NewLogEntry>,
}

impl<'a> StatusChange<'a> {
    /// Creates a status change without an accompanying log entry.
    #[must_use]
    pub const fn new(execution: &'a TaskExecution, expected: ExecutionStatus) -> Self {
        Self {
            execution,
            expected,
            log_entry: None,
        }
    }

    /// Attaches a log entry written in the same atomic step.
    #[must_use]
    pub const fn with_log_entry(mut self, log_entry: &'a NewLogEntry) -> Self {
        self.log_entry = Some(log_entry);
        self
    }
}

/// Durable execution ledger contract.
///
/// Implementations must make [`ExecutionLedger::insert_if_idle`] atomic with
/// respect to other inserts for the same definition, and
/// [`ExecutionLedger::apply_status_change`] atomic with respect to every
/// other write to the same execution. Process-local locking alone does not
/// satisfy this when several manager instances share one store.
#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Inserts a queued execution unless its definition already has an
    /// active one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DefinitionBusy`] carrying the conflicting
    /// execution, or [`LedgerError::DuplicateExecution`] when the identifier
    /// already exists.
    async fn insert_if_idle(&self, execution: &TaskExecution) -> LedgerResult<()>;

    /// Persists a status change if the stored status still equals
    /// `change.expected`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the execution does not exist
    /// and [`LedgerError::StatusConflict`] when another writer changed the
    /// status first. Nothing is written in either case.
    async fn apply_status_change(&self, change: StatusChange<'_>) -> LedgerResult<()>;

    /// Finds an execution by identifier.
    async fn find_by_id(&self, id: ExecutionId) -> LedgerResult<Option<TaskExecution>>;

    /// Returns the active execution of a definition, if any.
    async fn find_active(
        &self,
        definition_id: TaskDefinitionId,
    ) -> LedgerResult<Option<TaskExecution>>;

    /// Lists executions matching `filter`, ordered by `created_at`.
    async fn list(
        &self,
        filter: ExecutionFilter,
        order: SortOrder,
        page: PageRequest,
    ) -> LedgerResult<ExecutionPage>;

    /// Returns running executions started before `started_before` and, when
    /// given, queued executions created before `queued_before`.
    async fn find_stale(
        &self,
        started_before: DateTime<Utc>,
        queued_before: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TaskExecution>>;
}

/// Errors returned by execution ledger implementations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The definition already has a queued or running execution.
    #[error(
        "definition {definition_id} already has active execution {} ({})",
        active.execution_id,
        active.status
    )]
    DefinitionBusy {
        /// Definition whose slot is taken.
        definition_id: TaskDefinitionId,
        /// Execution holding the slot.
        active: ActiveExecution,
    },

    /// An execution with the same identifier already exists.
    #[error("duplicate execution identifier: {0}")]
    DuplicateExecution(ExecutionId),

    /// The definition referenced by a new execution does not exist.
    #[error("unknown task definition: {0}")]
    UnknownDefinition(TaskDefinitionId),

    /// The execution was not found.
    #[error("execution not found: {0}")]
    NotFound(ExecutionId),

    /// The stored status no longer matched the expected prior status.
    #[error("execution {execution_id} status changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        /// Execution identifier.
        execution_id: ExecutionId,
        /// Status the caller based its change on.
        expected: ExecutionStatus,
        /// Status found in the ledger.
        actual: ExecutionStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
