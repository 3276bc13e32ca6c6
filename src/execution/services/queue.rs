//! Task queue manager: enqueue, status changes, cancellation and log
//! ingestion.

use super::CancellationRegistry;
use crate::definition::{
    domain::TaskDefinitionId,
    ports::{TaskDefinitionRepository, TaskDefinitionRepositoryError},
};
use crate::execution::{
    domain::{
        ExecutionDomainError, ExecutionFilter, ExecutionId, ExecutionPage, ExecutionStatus,
        FailureReason, LogLevel, LogMessage, NewLogEntry, PageRequest, SortOrder, TaskExecution,
        TaskLogEntry, TriggerType,
    },
    ports::{
        DispatchError, ExecutionLedger, LedgerError, LogSink, LogSinkError, StatusChange,
        WorkerAssignment, WorkerDispatcher, WorkerExit,
    },
    wire::{LogIngestRequest, StatusReport, WorkerOutcome},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Attempts made when a status change races another writer.
const MAX_STATUS_ATTEMPTS: usize = 3;

/// Service-level errors for queue operations.
#[derive(Debug, Clone, Error)]
pub enum TaskQueueError {
    /// The definition does not exist.
    #[error("task definition not found: {0}")]
    DefinitionNotFound(TaskDefinitionId),

    /// The execution does not exist.
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// The definition exists but is not runnable.
    #[error("task definition {0} is disabled")]
    Disabled(TaskDefinitionId),

    /// The definition already has a queued or running execution.
    #[error("definition {definition_id} already has execution {execution_id} ({status})")]
    AlreadyRunning {
        /// Definition whose slot is taken.
        definition_id: TaskDefinitionId,
        /// Execution holding the slot.
        execution_id: ExecutionId,
        /// Its status (`queued` or `running`).
        status: ExecutionStatus,
    },

    /// The requested change is not permitted from the current status.
    #[error("cannot move execution {execution_id} from {from} to {to}")]
    InvalidStateTransition {
        /// Execution identifier.
        execution_id: ExecutionId,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// No worker could take the execution; it has been marked failed.
    #[error("execution {execution_id} could not be dispatched: {source}")]
    DispatchFailure {
        /// Execution that was rolled to `failed`.
        execution_id: ExecutionId,
        /// Dispatcher error.
        source: DispatchError,
    },

    /// A request payload was malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Store or runtime fault. Detail is kept in the error source.
    #[error("internal error")]
    Internal(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskQueueError {
    pub(crate) fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Arc::new(err))
    }

    /// Returns `true` for errors caused by the request rather than the
    /// system.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::DispatchFailure { .. } | Self::Internal(_))
    }
}

impl From<ExecutionDomainError> for TaskQueueError {
    fn from(err: ExecutionDomainError) -> Self {
        match err {
            ExecutionDomainError::InvalidStateTransition {
                execution_id,
                from,
                to,
            } => Self::InvalidStateTransition {
                execution_id,
                from,
                to,
            },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<TaskDefinitionRepositoryError> for TaskQueueError {
    fn from(err: TaskDefinitionRepositoryError) -> Self {
        match err {
            TaskDefinitionRepositoryError::NotFound(id) => Self::DefinitionNotFound(id),
            other => Self::internal(other),
        }
    }
}

impl From<LedgerError> for TaskQueueError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::DefinitionBusy {
                definition_id,
                active,
            } => Self::AlreadyRunning {
                definition_id,
                execution_id: active.execution_id,
                status: active.status,
            },
            LedgerError::UnknownDefinition(id) => Self::DefinitionNotFound(id),
            LedgerError::NotFound(id) => Self::ExecutionNotFound(id),
            other => Self::internal(other),
        }
    }
}

impl From<LogSinkError> for TaskQueueError {
    fn from(err: LogSinkError) -> Self {
        match err {
            LogSinkError::UnknownExecution(id) => Self::ExecutionNotFound(id),
            other @ LogSinkError::Persistence(_) => Self::internal(other),
        }
    }
}

/// Result type for queue service operations.
pub type TaskQueueResult<T> = Result<T, TaskQueueError>;

/// Page size and log window limits applied to queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Page size used when the caller does not ask for one.
    pub default_page_size: u32,
    /// Largest page size honoured.
    pub max_page_size: u32,
    /// Number of recent log entries included in execution detail.
    pub detail_log_limit: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            detail_log_limit: 50,
        }
    }
}

/// A log line to append to an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendLogRequest {
    execution_id: ExecutionId,
    level: String,
    message: String,
    context: Option<Value>,
    timestamp: Option<DateTime<Utc>>,
}

impl AppendLogRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            level: level.into(),
            message: message.into(),
            context: None,
            timestamp: None,
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets an explicit timestamp, stored unchanged.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<LogIngestRequest> for AppendLogRequest {
    fn from(request: LogIngestRequest) -> Self {
        Self {
            execution_id: request.execution_id,
            level: request.level,
            message: request.message,
            context: request.context,
            timestamp: request.timestamp,
        }
    }
}

/// An execution together with its most recent log entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionDetail {
    /// The execution.
    pub execution: TaskExecution,
    /// Latest entries in `(timestamp, sequence)` order.
    pub recent_logs: Vec<TaskLogEntry>,
}

/// Orchestrates the execution lifecycle over the ledger, log sink and
/// worker dispatcher.
pub struct TaskQueueService<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    definitions: Arc<R>,
    ledger: Arc<L>,
    logs: Arc<S>,
    dispatcher: Arc<D>,
    clock: Arc<C>,
    cancellations: CancellationRegistry,
    limits: QueryLimits,
}

impl<R, L, S, D, C> TaskQueueService<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates a queue service with default query limits and its own
    /// cancellation registry.
    #[must_use]
    pub fn new(
        definitions: Arc<R>,
        ledger: Arc<L>,
        logs: Arc<S>,
        dispatcher: Arc<D>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            definitions,
            ledger,
            logs,
            dispatcher,
            clock,
            cancellations: CancellationRegistry::new(),
            limits: QueryLimits::default(),
        }
    }

    /// Replaces the query limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Shares a cancellation registry with other components.
    #[must_use]
    pub fn with_cancellations(mut self, cancellations: CancellationRegistry) -> Self {
        self.cancellations = cancellations;
        self
    }

    /// Returns the registry holding this service's worker tokens.
    #[must_use]
    pub const fn cancellations(&self) -> &CancellationRegistry {
        &self.cancellations
    }

    /// Creates a queued execution and hands it to a worker.
    ///
    /// # Errors
    ///
    /// - [`TaskQueueError::DefinitionNotFound`] for an unknown definition.
    /// - [`TaskQueueError::Disabled`] when the definition is disabled.
    /// - [`TaskQueueError::AlreadyRunning`] when another execution of the
    ///   definition is queued or running.
    /// - [`TaskQueueError::DispatchFailure`] when no worker took the
    ///   execution; it has already been marked failed with an error log.
    pub async fn enqueue(
        &self,
        definition_id: TaskDefinitionId,
        trigger_type: TriggerType,
    ) -> TaskQueueResult<TaskExecution> {
        let definition = self
            .definitions
            .find_by_id(definition_id)
            .await?
            .ok_or(TaskQueueError::DefinitionNotFound(definition_id))?;
        if !definition.is_enabled() {
            warn!(%definition_id, "enqueue rejected: definition disabled");
            return Err(TaskQueueError::Disabled(definition_id));
        }

        let execution = TaskExecution::queue(definition_id, trigger_type, &*self.clock);
        let execution_id = execution.id();
        // Tracked before the row exists so a cancel racing the insert finds it.
        let token = self.cancellations.register(execution_id);
        if let Err(err) = self.ledger.insert_if_idle(&execution).await {
            self.cancellations.release(execution_id);
            let mapped = TaskQueueError::from(err);
            if let TaskQueueError::AlreadyRunning {
                execution_id: active_id,
                status,
                ..
            } = &mapped
            {
                info!(
                    %definition_id,
                    active_execution_id = %active_id,
                    %status,
                    "enqueue rejected: definition busy"
                );
            }
            return Err(mapped);
        }
        info!(%definition_id, %execution_id, %trigger_type, "execution queued");

        if token.is_cancelled() {
            info!(%execution_id, "execution cancelled before dispatch; no worker launched");
            return self.load(execution_id).await;
        }

        let assignment = WorkerAssignment::new(&execution, &definition, token);
        if let Err(source) = self.dispatcher.dispatch(assignment) {
            self.cancellations.release(execution_id);
            warn!(
                %definition_id,
                %execution_id,
                error = %source,
                "dispatch failed; marking execution failed"
            );
            self.record_dispatch_failure(execution_id, &source).await?;
            return Err(TaskQueueError::DispatchFailure {
                execution_id,
                source,
            });
        }

        // Another manager instance may have cancelled the row meanwhile.
        let current = self.load(execution_id).await?;
        if current.status() == ExecutionStatus::Cancelled {
            let signalled = self.cancellations.signal(execution_id);
            info!(
                %execution_id,
                worker_signalled = signalled,
                "execution cancelled during dispatch"
            );
        }
        Ok(current)
    }

    async fn record_dispatch_failure(
        &self,
        execution_id: ExecutionId,
        source: &DispatchError,
    ) -> TaskQueueResult<()> {
        let reason = FailureReason::new(format!("dispatch failed: {source}"))?;
        match self.fail_with(execution_id, reason).await {
            // Cancelled before the failure could be recorded.
            Ok(_) | Err(TaskQueueError::InvalidStateTransition { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Cancels a queued or running execution.
    ///
    /// The ledger row is cancelled immediately with an audit entry recording
    /// the previous status; the worker, if dispatched by this process, is
    /// signalled through its token.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ExecutionNotFound`] or
    /// [`TaskQueueError::InvalidStateTransition`] when the execution is
    /// already terminal.
    pub async fn cancel(&self, execution_id: ExecutionId) -> TaskQueueResult<TaskExecution> {
        let clock = &*self.clock;
        let execution = self
            .change_status(execution_id, |execution| {
                let previous = execution.cancel(clock)?;
                Ok(Some(NewLogEntry::cancellation_audit(
                    execution.id(),
                    previous,
                    execution.updated_at(),
                )))
            })
            .await?;
        let signalled = self.cancellations.signal(execution_id);
        info!(%execution_id, worker_signalled = signalled, "execution cancelled");
        Ok(execution)
    }

    /// Records that a worker has started the execution.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::InvalidStateTransition`] unless the
    /// execution is queued.
    pub async fn mark_started(&self, execution_id: ExecutionId) -> TaskQueueResult<TaskExecution> {
        let clock = &*self.clock;
        let execution = self
            .change_status(execution_id, |execution| {
                execution.mark_running(clock)?;
                Ok(None)
            })
            .await?;
        info!(%execution_id, "execution running");
        Ok(execution)
    }

    /// Records that the worker finished successfully.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::InvalidStateTransition`] unless the
    /// execution is running.
    pub async fn complete(&self, execution_id: ExecutionId) -> TaskQueueResult<TaskExecution> {
        let clock = &*self.clock;
        let execution = self
            .change_status(execution_id, |execution| {
                execution.complete(clock)?;
                Ok(None)
            })
            .await?;
        self.cancellations.release(execution_id);
        info!(%execution_id, "execution completed");
        Ok(execution)
    }

    /// Records that the worker failed the execution, with an error log
    /// entry.
    ///
    /// Only a running execution can be failed this way; a worker that never
    /// started is handled by [`Self::handle_worker_exit`] or the watchdog.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Validation`] for a blank reason and
    /// [`TaskQueueError::InvalidStateTransition`] unless the execution is
    /// running.
    pub async fn fail(
        &self,
        execution_id: ExecutionId,
        reason: &str,
    ) -> TaskQueueResult<TaskExecution> {
        let validated = FailureReason::new(reason)?;
        let execution = self
            .fail_from(execution_id, validated, &[ExecutionStatus::Running])
            .await?;
        self.cancellations.release(execution_id);
        Ok(execution)
    }

    async fn fail_with(
        &self,
        execution_id: ExecutionId,
        reason: FailureReason,
    ) -> TaskQueueResult<TaskExecution> {
        self.fail_from(
            execution_id,
            reason,
            &[ExecutionStatus::Queued, ExecutionStatus::Running],
        )
        .await
    }

    async fn fail_from(
        &self,
        execution_id: ExecutionId,
        reason: FailureReason,
        allowed: &[ExecutionStatus],
    ) -> TaskQueueResult<TaskExecution> {
        let clock = &*self.clock;
        let execution = self
            .change_status(execution_id, |execution| {
                let previous = execution.status();
                if !allowed.contains(&previous) {
                    return Err(ExecutionDomainError::InvalidStateTransition {
                        execution_id: execution.id(),
                        from: previous,
                        to: ExecutionStatus::Failed,
                    });
                }
                execution.fail(reason.clone(), clock)?;
                Ok(Some(NewLogEntry::failure(
                    execution.id(),
                    previous,
                    reason.as_str(),
                    execution.updated_at(),
                )))
            })
            .await?;
        warn!(%execution_id, reason = %reason, "execution failed");
        Ok(execution)
    }

    /// Fails the execution of a worker process that exited while the
    /// execution was still queued or running.
    ///
    /// Returns `None` when the worker had already reported a terminal status
    /// or the execution was cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ExecutionNotFound`] for an unknown execution
    /// and [`TaskQueueError::Internal`] when the ledger fails.
    pub async fn handle_worker_exit(
        &self,
        exit: &WorkerExit,
    ) -> TaskQueueResult<Option<TaskExecution>> {
        let execution_id = exit.execution_id;
        let current = self.load(execution_id).await?;
        if !current.status().is_active() {
            self.cancellations.release(execution_id);
            debug!(%execution_id, status = %current.status(), "worker exited after final status");
            return Ok(None);
        }

        let reason = FailureReason::new(format!(
            "worker exited before reporting a result ({})",
            exit.description
        ))?;
        let outcome = match self.fail_with(execution_id, reason).await {
            Ok(execution) => Some(execution),
            Err(TaskQueueError::InvalidStateTransition { from, .. }) => {
                debug!(%execution_id, status = %from, "execution settled while handling worker exit");
                None
            }
            Err(err) => return Err(err),
        };
        self.cancellations.release(execution_id);
        Ok(outcome)
    }

    /// Handles worker exits from `exits` until `shutdown` fires or every
    /// sender is gone.
    ///
    /// Errors are logged and the loop carries on.
    pub async fn watch_worker_exits(
        &self,
        mut exits: UnboundedReceiver<WorkerExit>,
        shutdown: CancellationToken,
    ) {
        loop {
            let exit = tokio::select! {
                () = shutdown.cancelled() => break,
                received = exits.recv() => match received {
                    Some(next) => next,
                    None => break,
                },
            };
            if let Err(err) = self.handle_worker_exit(&exit).await {
                warn!(execution_id = %exit.execution_id, error = %err, "failed to handle worker exit");
            }
        }
        info!("worker exit watcher stopped");
    }

    /// Force-fails running executions started before `running_before` and,
    /// when given, queued executions created before `queued_before`.
    ///
    /// Each expired execution gets an error log entry and its worker token
    /// is fired. Executions that changed status since the scan are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Internal`] when the ledger fails.
    pub async fn expire_stale(
        &self,
        running_before: DateTime<Utc>,
        queued_before: Option<DateTime<Utc>>,
    ) -> TaskQueueResult<Vec<TaskExecution>> {
        let candidates = self.ledger.find_stale(running_before, queued_before).await?;
        let mut expired = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let observed = candidate.status();
            let reason = FailureReason::new(format!("{observed} timeout exceeded"))?;
            let clock = &*self.clock;
            let outcome = self
                .change_status(candidate.id(), |execution| {
                    if execution.status() != observed {
                        return Err(ExecutionDomainError::InvalidStateTransition {
                            execution_id: execution.id(),
                            from: execution.status(),
                            to: ExecutionStatus::Failed,
                        });
                    }
                    execution.fail(reason.clone(), clock)?;
                    Ok(Some(NewLogEntry::failure(
                        execution.id(),
                        observed,
                        reason.as_str(),
                        execution.updated_at(),
                    )))
                })
                .await;

            match outcome {
                Ok(execution) => {
                    let signalled = self.cancellations.signal(execution.id());
                    warn!(
                        execution_id = %execution.id(),
                        previous_status = %observed,
                        worker_signalled = signalled,
                        "stale execution failed"
                    );
                    expired.push(execution);
                }
                Err(TaskQueueError::InvalidStateTransition { execution_id, from, .. }) => {
                    debug!(%execution_id, status = %from, "stale execution moved on; skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(expired)
    }

    /// Applies a worker status report.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Self::mark_started`], [`Self::complete`]
    /// and [`Self::fail`]; in particular a failure report for a queued
    /// execution is an [`TaskQueueError::InvalidStateTransition`].
    pub async fn report_status(&self, report: StatusReport) -> TaskQueueResult<TaskExecution> {
        match report.outcome {
            WorkerOutcome::Started => self.mark_started(report.execution_id).await,
            WorkerOutcome::Succeeded => self.complete(report.execution_id).await,
            WorkerOutcome::Failed { reason } => self.fail(report.execution_id, &reason).await,
        }
    }

    /// Returns whether the execution has been cancelled, for worker polling.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ExecutionNotFound`] for an unknown
    /// execution.
    pub async fn is_cancellation_requested(&self, execution_id: ExecutionId) -> TaskQueueResult<bool> {
        let execution = self.load(execution_id).await?;
        Ok(execution.status() == ExecutionStatus::Cancelled)
    }

    /// Appends one log entry to an execution. Never changes its status.
    ///
    /// Entries arriving after cancellation are stored and tagged as
    /// post-cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Validation`] for an unknown level or blank
    /// message and [`TaskQueueError::ExecutionNotFound`] for an unknown
    /// execution; nothing is written in either case.
    pub async fn append_log(&self, request: AppendLogRequest) -> TaskQueueResult<TaskLogEntry> {
        let level = LogLevel::try_from(request.level.as_str())
            .map_err(|err| TaskQueueError::Validation(err.to_string()))?;
        let message = LogMessage::new(request.message)?;
        let entry = NewLogEntry::from_worker(
            request.execution_id,
            level,
            message,
            request.context,
            request.timestamp,
            &*self.clock,
        );
        let stored = self.logs.append(&entry).await?;
        if stored.post_cancellation {
            debug!(
                execution_id = %stored.execution_id,
                sequence = stored.sequence,
                "log entry arrived after cancellation"
            );
        }
        Ok(stored)
    }

    /// Appends a log line received over the worker protocol.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append_log`].
    pub async fn ingest(&self, request: LogIngestRequest) -> TaskQueueResult<TaskLogEntry> {
        self.append_log(request.into()).await
    }

    /// Returns an execution with its most recent log entries.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ExecutionNotFound`] for an unknown
    /// execution.
    pub async fn get_detail(&self, execution_id: ExecutionId) -> TaskQueueResult<ExecutionDetail> {
        let execution = self.load(execution_id).await?;
        let recent_logs = self
            .logs
            .recent(execution_id, self.limits.detail_log_limit)
            .await?;
        Ok(ExecutionDetail {
            execution,
            recent_logs,
        })
    }

    /// Returns every log entry of an execution.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::ExecutionNotFound`] for an unknown
    /// execution.
    pub async fn logs(&self, execution_id: ExecutionId) -> TaskQueueResult<Vec<TaskLogEntry>> {
        self.load(execution_id).await?;
        Ok(self.logs.list_all(execution_id).await?)
    }

    /// Lists executions. A missing page request yields the first page at the
    /// default size; oversized pages are capped.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Internal`] when the ledger fails.
    pub async fn list(
        &self,
        filter: ExecutionFilter,
        order: SortOrder,
        page: Option<PageRequest>,
    ) -> TaskQueueResult<ExecutionPage> {
        let window = page
            .unwrap_or_else(|| PageRequest::first(self.limits.default_page_size))
            .clamped(self.limits.max_page_size);
        Ok(self.ledger.list(filter, order, window).await?)
    }

    async fn load(&self, execution_id: ExecutionId) -> TaskQueueResult<TaskExecution> {
        self.ledger
            .find_by_id(execution_id)
            .await?
            .ok_or(TaskQueueError::ExecutionNotFound(execution_id))
    }

    /// Applies `apply` to the stored execution and persists the result with
    /// compare-and-swap, reloading when another writer got there first.
    async fn change_status<F>(
        &self,
        execution_id: ExecutionId,
        apply: F,
    ) -> TaskQueueResult<TaskExecution>
    where
        F: Fn(&mut TaskExecution) -> Result<Option<NewLogEntry>, ExecutionDomainError> + Send + Sync,
    {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let mut execution = self.load(execution_id).await?;
            let expected = execution.status();
            let log_entry = apply(&mut execution)?;

            let mut change = StatusChange::new(&execution, expected);
            if let Some(entry) = &log_entry {
                change = change.with_log_entry(entry);
            }
            match self.ledger.apply_status_change(change).await {
                Ok(()) => return Ok(execution),
                Err(LedgerError::StatusConflict { actual, .. }) => {
                    debug!(%execution_id, %expected, %actual, "status changed concurrently; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(TaskQueueError::internal(std::io::Error::other(format!(
            "execution {execution_id} kept changing status concurrently"
        ))))
    }
}
