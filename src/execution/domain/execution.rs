//! Task execution aggregate root.

use super::{ExecutionDomainError, ExecutionId, ExecutionStatus, TriggerType};
use crate::definition::domain::TaskDefinitionId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-empty reason recorded when an execution fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureReason(String);

impl FailureReason {
    /// Creates a validated failure reason.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::EmptyFailureReason`] when the trimmed
    /// value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ExecutionDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ExecutionDomainError::EmptyFailureReason);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the reason as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One run attempt of a task definition.
///
/// Every status change goes through [`TaskExecution::transition_to`], which
/// enforces the state machine and stamps the lifecycle timestamps. Once a
/// terminal status is reached the aggregate rejects further changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecution {
    id: ExecutionId,
    definition_id: TaskDefinitionId,
    status: ExecutionStatus,
    trigger_type: TriggerType,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<FailureReason>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedExecutionData {
    /// Persisted execution identifier.
    pub id: ExecutionId,
    /// Owning definition.
    pub definition_id: TaskDefinitionId,
    /// Persisted status.
    pub status: ExecutionStatus,
    /// Persisted trigger type.
    pub trigger_type: TriggerType,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted start timestamp, if started.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp, if terminal.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted failure reason, if failed.
    pub failure_reason: Option<FailureReason>,
    /// Persisted latest modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskExecution {
    /// Creates a new queued execution for a definition.
    #[must_use]
    pub fn queue(
        definition_id: TaskDefinitionId,
        trigger_type: TriggerType,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: ExecutionId::new(),
            definition_id,
            status: ExecutionStatus::Queued,
            trigger_type,
            created_at: timestamp,
            started_at: None,
            completed_at: None,
            failure_reason: None,
            updated_at: timestamp,
        }
    }

    /// Reconstructs an execution from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedExecutionData) -> Self {
        Self {
            id: data.id,
            definition_id: data.definition_id,
            status: data.status,
            trigger_type: data.trigger_type,
            created_at: data.created_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
            failure_reason: data.failure_reason,
            updated_at: data.updated_at,
        }
    }

    /// Returns the execution identifier.
    #[must_use]
    pub const fn id(&self) -> ExecutionId {
        self.id
    }

    /// Returns the owning definition identifier.
    #[must_use]
    pub const fn definition_id(&self) -> TaskDefinitionId {
        self.definition_id
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Returns the trigger type.
    #[must_use]
    pub const fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when a worker started the execution.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the execution reached a terminal status.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the recorded failure reason.
    #[must_use]
    pub const fn failure_reason(&self) -> Option<&FailureReason> {
        self.failure_reason.as_ref()
    }

    /// Returns the latest modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` once the execution can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves a queued execution to running and stamps `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidStateTransition`] unless the
    /// execution is queued.
    pub fn mark_running(&mut self, clock: &impl Clock) -> Result<(), ExecutionDomainError> {
        self.transition_to(ExecutionStatus::Running, clock)?;
        Ok(())
    }

    /// Marks a running execution as completed.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidStateTransition`] unless the
    /// execution is running.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<(), ExecutionDomainError> {
        self.transition_to(ExecutionStatus::Completed, clock)?;
        Ok(())
    }

    /// Marks the execution as failed with a reason.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidStateTransition`] when the
    /// execution is already terminal.
    pub fn fail(
        &mut self,
        reason: FailureReason,
        clock: &impl Clock,
    ) -> Result<(), ExecutionDomainError> {
        self.transition_to(ExecutionStatus::Failed, clock)?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Cancels a queued or running execution and returns the prior status.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidStateTransition`] when the
    /// execution is already terminal.
    pub fn cancel(&mut self, clock: &impl Clock) -> Result<ExecutionStatus, ExecutionDomainError> {
        self.transition_to(ExecutionStatus::Cancelled, clock)
    }

    /// Applies a validated status change and returns the prior status.
    ///
    /// Entering `Running` stamps `started_at`; entering a terminal status
    /// stamps `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::InvalidStateTransition`] when the
    /// state machine forbids the change. The aggregate is left untouched.
    pub fn transition_to(
        &mut self,
        target: ExecutionStatus,
        clock: &impl Clock,
    ) -> Result<ExecutionStatus, ExecutionDomainError> {
        let previous = self.status;
        if !previous.can_transition_to(target) {
            return Err(ExecutionDomainError::InvalidStateTransition {
                execution_id: self.id,
                from: previous,
                to: target,
            });
        }

        let timestamp = clock.utc();
        if target == ExecutionStatus::Running {
            self.started_at = Some(timestamp);
        }
        if target.is_terminal() {
            self.completed_at = Some(timestamp);
        }
        self.status = target;
        self.updated_at = timestamp;
        Ok(previous)
    }
}
