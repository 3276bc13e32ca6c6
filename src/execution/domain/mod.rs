//! Domain model for task executions and their log entries.
//!
//! Executions carry the lifecycle state machine; log entries are immutable
//! records appended on behalf of a running worker or by the manager itself.

mod error;
mod execution;
mod ids;
mod log_entry;
mod query;
mod status;

pub use error::{
    ExecutionDomainError, ParseExecutionStatusError, ParseLogLevelError, ParseTriggerTypeError,
};
pub use execution::{FailureReason, PersistedExecutionData, TaskExecution};
pub use ids::{ExecutionId, LogEntryId};
pub use log_entry::{LogLevel, LogMessage, LogSource, NewLogEntry, TaskLogEntry};
pub use query::{ExecutionFilter, ExecutionPage, PageRequest, SortOrder};
pub use status::{ExecutionStatus, TriggerType};
