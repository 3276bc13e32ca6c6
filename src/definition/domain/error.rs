//! Error types for task definition validation and parsing.

use thiserror::Error;

/// Errors returned while constructing definition domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionDomainError {
    /// The definition name is empty after trimming.
    #[error("task definition name must not be empty")]
    EmptyName,

    /// The definition name exceeds the storage limit.
    #[error("task definition name exceeds 255 character limit: {0}")]
    NameTooLong(String),

    /// A schedule interval must be at least one second.
    #[error("schedule interval must be a positive number of seconds, got {0}")]
    InvalidScheduleInterval(u64),
}

/// Error returned while parsing a target site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported target site: {0}")]
pub struct ParseTargetSiteError(pub String);
