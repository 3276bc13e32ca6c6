//! Diesel row models for task definition persistence.

use super::schema::task_definitions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task definitions.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_definitions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DefinitionRow {
    /// Definition identifier.
    pub id: uuid::Uuid,
    /// Definition name.
    pub name: String,
    /// Target site in canonical string form.
    pub target_site: String,
    /// Enablement flag.
    pub is_enabled: bool,
    /// Schedule interval in seconds.
    pub schedule_interval_secs: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert and update model for task definitions.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = task_definitions)]
#[diesel(treat_none_as_null = true)]
pub struct DefinitionChangeset {
    /// Definition identifier.
    pub id: uuid::Uuid,
    /// Definition name.
    pub name: String,
    /// Target site in canonical string form.
    pub target_site: String,
    /// Enablement flag.
    pub is_enabled: bool,
    /// Schedule interval in seconds.
    pub schedule_interval_secs: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
