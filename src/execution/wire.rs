//! Worker-facing wire formats.
//!
//! Workers learn their identity from environment variables at launch and
//! report back with JSON payloads. Payload fields stay loosely typed where
//! the queue service owns validation (log level and message), so a bad value
//! surfaces as a validation error rather than a decode failure.

use crate::definition::domain::{ParseTargetSiteError, TargetSite, TaskDefinitionId};
use crate::execution::{
    domain::{ExecutionId, ParseTriggerTypeError, TriggerType},
    ports::WorkerAssignment,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Environment variable carrying the execution identifier.
pub const EXECUTION_ID_VAR: &str = "SCRAPEYARD_EXECUTION_ID";
/// Environment variable carrying the definition identifier.
pub const DEFINITION_ID_VAR: &str = "SCRAPEYARD_DEFINITION_ID";
/// Environment variable carrying the target site.
pub const TARGET_SITE_VAR: &str = "SCRAPEYARD_TARGET_SITE";
/// Environment variable carrying the trigger type.
pub const TRIGGER_VAR: &str = "SCRAPEYARD_TRIGGER";

/// Errors raised while decoding worker payloads or the launch environment.
#[derive(Debug, Error)]
pub enum WireError {
    /// A payload was not valid JSON for its type.
    #[error("malformed worker payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A launch variable was not set.
    #[error("missing environment variable {0}")]
    MissingVariable(&'static str),

    /// A launch identifier was not a UUID.
    #[error("environment variable {name} is not a valid identifier: {source}")]
    InvalidIdentifier {
        /// Variable name.
        name: &'static str,
        /// Parse failure.
        source: uuid::Error,
    },

    /// The target site variable named an unsupported site.
    #[error(transparent)]
    InvalidTargetSite(#[from] ParseTargetSiteError),

    /// The trigger variable named an unknown trigger type.
    #[error(transparent)]
    InvalidTrigger(#[from] ParseTriggerTypeError),
}

/// Identity handed to a worker process at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerEnvironment {
    /// Execution the worker reports against.
    pub execution_id: ExecutionId,
    /// Definition being run.
    pub definition_id: TaskDefinitionId,
    /// Site to scrape.
    pub target_site: TargetSite,
    /// Trigger that produced the execution.
    pub trigger_type: TriggerType,
}

impl WorkerEnvironment {
    /// Extracts the launch identity from an assignment.
    #[must_use]
    pub const fn from_assignment(assignment: &WorkerAssignment) -> Self {
        Self {
            execution_id: assignment.execution_id,
            definition_id: assignment.definition_id,
            target_site: assignment.target_site,
            trigger_type: assignment.trigger_type,
        }
    }

    /// Returns the variables to set on the worker process.
    #[must_use]
    pub fn vars(&self) -> [(&'static str, String); 4] {
        [
            (EXECUTION_ID_VAR, self.execution_id.to_string()),
            (DEFINITION_ID_VAR, self.definition_id.to_string()),
            (TARGET_SITE_VAR, self.target_site.as_str().to_owned()),
            (TRIGGER_VAR, self.trigger_type.as_str().to_owned()),
        ]
    }

    /// Reads the launch identity through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when a variable is missing or malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WireError> {
        let read = |name: &'static str| lookup(name).ok_or(WireError::MissingVariable(name));
        let parse_uuid = |name: &'static str| {
            let raw = read(name)?;
            Uuid::parse_str(raw.trim())
                .map_err(|source| WireError::InvalidIdentifier { name, source })
        };

        Ok(Self {
            execution_id: ExecutionId::from_uuid(parse_uuid(EXECUTION_ID_VAR)?),
            definition_id: TaskDefinitionId::from_uuid(parse_uuid(DEFINITION_ID_VAR)?),
            target_site: TargetSite::try_from(read(TARGET_SITE_VAR)?.as_str())?,
            trigger_type: TriggerType::try_from(read(TRIGGER_VAR)?.as_str())?,
        })
    }

    /// Reads the launch identity from the current process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when a variable is missing or malformed.
    pub fn from_process_env() -> Result<Self, WireError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// A log line reported by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogIngestRequest {
    /// Execution the entry belongs to.
    pub execution_id: ExecutionId,
    /// Severity name; `debug`, `info`, `warning`, `warn` or `error`.
    pub level: String,
    /// Message text.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// RFC 3339 timestamp; ingestion time is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogIngestRequest {
    /// Decodes a request from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Payload`] for malformed JSON, unknown execution
    /// id syntax or a timestamp that is not RFC 3339.
    pub fn from_json(payload: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Outcome a worker reports about its execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// The worker picked up the execution.
    Started,
    /// The scrape finished successfully.
    Succeeded,
    /// The scrape failed.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

/// A status report sent by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Execution being reported on.
    pub execution_id: ExecutionId,
    /// What happened.
    pub outcome: WorkerOutcome,
}

impl StatusReport {
    /// Decodes a report from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Payload`] for malformed JSON.
    pub fn from_json(payload: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(payload)?)
    }
}
