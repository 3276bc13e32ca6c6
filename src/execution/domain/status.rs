//! Execution status state machine and trigger types.

use super::{ParseExecutionStatusError, ParseTriggerTypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a task execution.
///
/// ```text
/// QUEUED ──start──▶ RUNNING ──success──▶ COMPLETED
///   │                 │ └────failure───▶ FAILED
///   │                 └──────cancel────▶ CANCELLED
///   ├──────cancel────────────────────▶ CANCELLED
///   └──dispatch failure / timeout────▶ FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Created and waiting for a worker to start.
    Queued,
    /// A worker has accepted the execution.
    Running,
    /// The worker reported success.
    Completed,
    /// Dispatch failed, the worker reported failure, or the watchdog fired.
    Failed,
    /// Cancelled before or during the run.
    Cancelled,
}

impl ExecutionStatus {
    /// Statuses that hold the single-flight slot for a definition.
    pub const ACTIVE: [Self; 2] = [Self::Queued, Self::Running];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for statuses no execution may leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` while the execution blocks new enqueues of its
    /// definition.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns whether the state machine permits moving to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Queued,
                Self::Running | Self::Cancelled | Self::Failed
            ) | (
                Self::Running,
                Self::Completed | Self::Failed | Self::Cancelled
            )
        )
    }
}

impl TryFrom<&str> for ExecutionStatus {
    type Error = ParseExecutionStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseExecutionStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused an execution to be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    /// An operator asked for the run.
    Manual,
    /// The schedule driver fired.
    Scheduled,
}

impl TriggerType {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl TryFrom<&str> for TriggerType {
    type Error = ParseTriggerTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(ParseTriggerTypeError(value.to_owned())),
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
