//! `PostgreSQL` repository implementation for task definitions.

use super::{
    models::{DefinitionChangeset, DefinitionRow},
    schema::task_definitions,
};
use crate::definition::{
    domain::{
        DefinitionName, PersistedDefinitionData, ScheduleInterval, TargetSite, TaskDefinition,
        TaskDefinitionId,
    },
    ports::{
        TaskDefinitionRepository, TaskDefinitionRepositoryError, TaskDefinitionRepositoryResult,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by definition adapters.
pub type DefinitionPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task definition repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskDefinitionRepository {
    pool: DefinitionPgPool,
}

impl PostgresTaskDefinitionRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: DefinitionPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskDefinitionRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskDefinitionRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(TaskDefinitionRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskDefinitionRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskDefinitionRepository for PostgresTaskDefinitionRepository {
    async fn store(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()> {
        let definition_id = definition.id();
        let row = to_changeset(definition)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(task_definitions::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskDefinitionRepositoryError::DuplicateDefinition(definition_id)
                    }
                    _ => TaskDefinitionRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()> {
        let definition_id = definition.id();
        let row = to_changeset(definition)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                task_definitions::table
                    .filter(task_definitions::id.eq(definition_id.into_inner())),
            )
            .set(&row)
            .execute(connection)
            .map_err(TaskDefinitionRepositoryError::persistence)?;
            if updated == 0 {
                return Err(TaskDefinitionRepositoryError::NotFound(definition_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: TaskDefinitionId,
    ) -> TaskDefinitionRepositoryResult<Option<TaskDefinition>> {
        self.run_blocking(move |connection| {
            let row = task_definitions::table
                .filter(task_definitions::id.eq(id.into_inner()))
                .select(DefinitionRow::as_select())
                .first::<DefinitionRow>(connection)
                .optional()
                .map_err(TaskDefinitionRepositoryError::persistence)?;
            row.map(row_to_definition).transpose()
        })
        .await
    }

    async fn list_scheduled(&self) -> TaskDefinitionRepositoryResult<Vec<TaskDefinition>> {
        self.run_blocking(move |connection| {
            task_definitions::table
                .filter(task_definitions::is_enabled.eq(true))
                .filter(task_definitions::schedule_interval_secs.is_not_null())
                .order(task_definitions::created_at.asc())
                .select(DefinitionRow::as_select())
                .load::<DefinitionRow>(connection)
                .map_err(TaskDefinitionRepositoryError::persistence)?
                .into_iter()
                .map(row_to_definition)
                .collect()
        })
        .await
    }
}

fn to_changeset(definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<DefinitionChangeset> {
    let schedule_interval_secs = definition
        .schedule()
        .map(|interval| i64::try_from(interval.as_secs()))
        .transpose()
        .map_err(TaskDefinitionRepositoryError::persistence)?;

    Ok(DefinitionChangeset {
        id: definition.id().into_inner(),
        name: definition.name().as_str().to_owned(),
        target_site: definition.target_site().as_str().to_owned(),
        is_enabled: definition.is_enabled(),
        schedule_interval_secs,
        created_at: definition.created_at(),
        updated_at: definition.updated_at(),
    })
}

fn row_to_definition(row: DefinitionRow) -> TaskDefinitionRepositoryResult<TaskDefinition> {
    let name = DefinitionName::new(row.name).map_err(TaskDefinitionRepositoryError::persistence)?;
    let target_site = TargetSite::try_from(row.target_site.as_str())
        .map_err(TaskDefinitionRepositoryError::persistence)?;
    let schedule = row
        .schedule_interval_secs
        .map(|seconds| {
            let unsigned =
                u64::try_from(seconds).map_err(TaskDefinitionRepositoryError::persistence)?;
            ScheduleInterval::from_secs(unsigned)
                .map_err(TaskDefinitionRepositoryError::persistence)
        })
        .transpose()?;

    Ok(TaskDefinition::from_persisted(PersistedDefinitionData {
        id: TaskDefinitionId::from_uuid(row.id),
        name,
        target_site,
        is_enabled: row.is_enabled,
        schedule,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
