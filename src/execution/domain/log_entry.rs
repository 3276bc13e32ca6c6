//! Structured log entries attached to executions.

use super::{ExecutionDomainError, ExecutionId, ExecutionStatus, LogEntryId, ParseLogLevelError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal progress.
    Info,
    /// Recoverable problems.
    Warning,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl TryFrom<&str> for LogLevel {
    type Error = ParseLogLevelError;

    fn try_from(value: &str) -> Result<Self, <Self as TryFrom<&str>>::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseLogLevelError(value.to_owned())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who wrote a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogSource {
    /// Reported by the worker through the ingestion interface.
    Worker,
    /// Written by the queue manager (audit, dispatch and timeout failures).
    System,
}

impl LogSource {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::System => "system",
        }
    }

    /// Parses the storage representation, returning `None` for unknown
    /// values.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "worker" => Some(Self::Worker),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Non-empty log message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogMessage(String);

impl LogMessage {
    /// Creates a validated log message.
    ///
    /// Surrounding whitespace is kept; only a blank message is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionDomainError::EmptyLogMessage`] when the value is
    /// empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, ExecutionDomainError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(ExecutionDomainError::EmptyLogMessage);
        }
        Ok(Self(raw))
    }

    /// Returns the message as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A log entry that has been validated but not yet appended.
///
/// The sink assigns the arrival sequence and the post-cancellation tag when
/// it stores the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    /// Identifier the stored entry will carry.
    pub id: LogEntryId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: LogMessage,
    /// Optional structured payload.
    pub context: Option<Value>,
    /// Reported or ingestion-time timestamp.
    pub timestamp: DateTime<Utc>,
    /// Writer of the entry.
    pub source: LogSource,
}

impl NewLogEntry {
    /// Builds a worker-reported entry.
    ///
    /// When `timestamp` is `None` the ingestion time from `clock` is used;
    /// an explicit timestamp is stored unchanged.
    #[must_use]
    pub fn from_worker(
        execution_id: ExecutionId,
        level: LogLevel,
        message: LogMessage,
        context: Option<Value>,
        timestamp: Option<DateTime<Utc>>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            execution_id,
            level,
            message,
            context,
            timestamp: timestamp.unwrap_or_else(|| clock.utc()),
            source: LogSource::Worker,
        }
    }

    /// Builds the audit entry recorded when an execution is cancelled.
    #[must_use]
    pub fn cancellation_audit(
        execution_id: ExecutionId,
        previous_status: ExecutionStatus,
        cancelled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            execution_id,
            level: LogLevel::Warning,
            message: LogMessage(format!(
                "execution cancelled (previous status: {previous_status})"
            )),
            context: Some(json!({
                "event": "cancelled",
                "previous_status": previous_status.as_str(),
                "cancelled_at": cancelled_at.to_rfc3339(),
            })),
            timestamp: cancelled_at,
            source: LogSource::System,
        }
    }

    /// Builds the error entry recorded when an execution fails.
    #[must_use]
    pub fn failure(
        execution_id: ExecutionId,
        previous_status: ExecutionStatus,
        reason: &str,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            execution_id,
            level: LogLevel::Error,
            message: LogMessage(format!("execution failed: {reason}")),
            context: Some(json!({
                "event": "failed",
                "previous_status": previous_status.as_str(),
                "reason": reason,
            })),
            timestamp: failed_at,
            source: LogSource::System,
        }
    }

    /// Completes the entry with the values assigned by the sink.
    #[must_use]
    pub fn into_stored(self, sequence: i64, post_cancellation: bool) -> TaskLogEntry {
        TaskLogEntry {
            id: self.id,
            execution_id: self.execution_id,
            sequence,
            level: self.level,
            message: self.message,
            context: self.context,
            timestamp: self.timestamp,
            source: self.source,
            post_cancellation,
        }
    }
}

/// An immutable stored log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    /// Entry identifier.
    pub id: LogEntryId,
    /// Owning execution.
    pub execution_id: ExecutionId,
    /// Arrival order assigned by the sink; tie-break for equal timestamps.
    pub sequence: i64,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: LogMessage,
    /// Optional structured payload.
    pub context: Option<Value>,
    /// Reported or ingestion-time timestamp.
    pub timestamp: DateTime<Utc>,
    /// Writer of the entry.
    pub source: LogSource,
    /// Set when the entry arrived after the execution was cancelled.
    pub post_cancellation: bool,
}

impl TaskLogEntry {
    /// Ordering key: timestamp first, arrival sequence second.
    #[must_use]
    pub const fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.timestamp, self.sequence)
    }
}
