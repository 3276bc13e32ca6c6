//! Diesel row models for execution persistence.

use super::schema::{task_executions, task_logs};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for executions.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_executions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ExecutionRow {
    /// Execution identifier.
    pub id: uuid::Uuid,
    /// Owning definition.
    pub definition_id: uuid::Uuid,
    /// Status in canonical string form.
    pub status: String,
    /// Trigger type in canonical string form.
    pub trigger_type: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Worker start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal status timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for executions.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_executions)]
pub struct NewExecutionRow {
    /// Execution identifier.
    pub id: uuid::Uuid,
    /// Owning definition.
    pub definition_id: uuid::Uuid,
    /// Status in canonical string form.
    pub status: String,
    /// Trigger type in canonical string form.
    pub trigger_type: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Worker start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal status timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied by compare-and-swap status updates.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = task_executions)]
#[diesel(treat_none_as_null = true)]
pub struct ExecutionStatusChangeset {
    /// New status.
    pub status: String,
    /// Worker start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal status timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for log entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LogRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Owning execution.
    pub execution_id: uuid::Uuid,
    /// Arrival sequence.
    pub seq: i64,
    /// Severity in canonical string form.
    pub level: String,
    /// Message text.
    pub message: String,
    /// Structured payload.
    pub context: Option<Value>,
    /// Entry timestamp.
    pub logged_at: DateTime<Utc>,
    /// Writer in canonical string form.
    pub source: String,
    /// Post-cancellation tag.
    pub post_cancellation: bool,
}

/// Insert model for log entries; `seq` is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_logs)]
pub struct NewLogRow {
    /// Entry identifier.
    pub id: uuid::Uuid,
    /// Owning execution.
    pub execution_id: uuid::Uuid,
    /// Severity in canonical string form.
    pub level: String,
    /// Message text.
    pub message: String,
    /// Structured payload.
    pub context: Option<Value>,
    /// Entry timestamp.
    pub logged_at: DateTime<Utc>,
    /// Writer in canonical string form.
    pub source: String,
    /// Post-cancellation tag.
    pub post_cancellation: bool,
}
