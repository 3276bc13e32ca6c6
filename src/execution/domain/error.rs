//! Error types for execution domain validation and parsing.

use super::{ExecutionId, ExecutionStatus};
use thiserror::Error;

/// Errors returned by execution domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionDomainError {
    /// The requested status change is not permitted by the state machine.
    #[error("invalid state transition for execution {execution_id}: {from} -> {to}")]
    InvalidStateTransition {
        /// Execution identifier.
        execution_id: ExecutionId,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// A log message is empty after trimming.
    #[error("log message must not be empty")]
    EmptyLogMessage,

    /// A failure reason is empty after trimming.
    #[error("failure reason must not be empty")]
    EmptyFailureReason,

    /// Page numbers and sizes start at one.
    #[error("invalid page request: page {page}, per page {per_page}")]
    InvalidPageRequest {
        /// Requested page (one-based).
        page: u32,
        /// Requested page size.
        per_page: u32,
    },
}

/// Error returned while parsing execution statuses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown execution status: {0}")]
pub struct ParseExecutionStatusError(pub String);

/// Error returned while parsing trigger types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown trigger type: {0}")]
pub struct ParseTriggerTypeError(pub String);

/// Error returned while parsing log levels.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLogLevelError(pub String);
