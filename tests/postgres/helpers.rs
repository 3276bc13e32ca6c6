//! Shared fixtures for `PostgreSQL` ledger tests.

pub use super::cluster::{BoxError, PostgresCluster, postgres_cluster, test_runtime};
use super::cluster::{ManagedCluster, TemporaryDatabase};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use scrapeyard::{
    definition::{
        adapters::postgres::PostgresTaskDefinitionRepository,
        domain::{DefinitionName, TargetSite, TaskDefinition},
        ports::TaskDefinitionRepository,
    },
    execution::{
        adapters::{RecordingDispatcher, postgres::PostgresExecutionStore},
        services::TaskQueueService,
    },
};
use std::sync::Arc;
use uuid::Uuid;

/// Schema every test database starts from.
pub const SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_scrape_tables/up.sql");

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "scrapeyard_test_template";

/// Queue service backed by `PostgreSQL`.
pub type PgQueue = TaskQueueService<
    PostgresTaskDefinitionRepository,
    PostgresExecutionStore,
    PostgresExecutionStore,
    RecordingDispatcher,
    DefaultClock,
>;

/// Creates the template database on first use.
///
/// # Errors
///
/// Returns an error if the template cannot be created or migrated.
pub fn ensure_template(cluster: &ManagedCluster) -> Result<(), BoxError> {
    cluster.ensure_template_exists(TEMPLATE_DB, |url| {
        let mut conn = PgConnection::establish(url)?;
        conn.batch_execute(SCHEMA_SQL)?;
        Ok(())
    })
}

/// Adapters pointing at one manager instance's pool.
pub struct ManagerInstance {
    pub definitions: Arc<PostgresTaskDefinitionRepository>,
    pub store: Arc<PostgresExecutionStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub queue: Arc<PgQueue>,
}

impl ManagerInstance {
    fn connect(url: &str) -> Result<Self, BoxError> {
        let pool = Pool::builder()
            .max_size(4)
            .build(ConnectionManager::<PgConnection>::new(url))?;
        let definitions = Arc::new(PostgresTaskDefinitionRepository::new(pool.clone()));
        let store = Arc::new(PostgresExecutionStore::new(pool));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let queue = Arc::new(TaskQueueService::new(
            Arc::clone(&definitions),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&dispatcher),
            Arc::new(DefaultClock),
        ));
        Ok(Self {
            definitions,
            store,
            dispatcher,
            queue,
        })
    }
}

/// A fresh database plus a manager instance connected to it.
pub struct PgContext {
    pub manager: ManagerInstance,
    db: TemporaryDatabase,
}

impl PgContext {
    /// Clones the template into a new database and connects to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or pool cannot be created.
    pub fn new(cluster: PostgresCluster) -> Result<Self, BoxError> {
        ensure_template(cluster)?;
        let db = cluster.temporary_database_from_template(
            &format!("scrapeyard_test_{}", Uuid::new_v4().simple()),
            TEMPLATE_DB,
        )?;
        let manager = ManagerInstance::connect(&db.url())?;
        Ok(Self { manager, db })
    }

    /// Another manager instance sharing this database over its own pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn another_instance(&self) -> Result<ManagerInstance, BoxError> {
        ManagerInstance::connect(&self.db.url())
    }

    /// A direct connection for raw SQL checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub fn raw_connection(&self) -> Result<PgConnection, BoxError> {
        Ok(PgConnection::establish(&self.db.url())?)
    }

    /// Stores an enabled definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the insert fails.
    pub async fn stored_definition(
        &self,
        name: &str,
        site: TargetSite,
    ) -> Result<TaskDefinition, BoxError> {
        let definition = TaskDefinition::new(DefinitionName::new(name)?, site, &DefaultClock);
        self.manager.definitions.store(&definition).await?;
        Ok(definition)
    }
}
