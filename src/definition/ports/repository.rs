//! Repository port for task definition persistence and lookup.

use crate::definition::domain::{TaskDefinition, TaskDefinitionId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task definition repository operations.
pub type TaskDefinitionRepositoryResult<T> = Result<T, TaskDefinitionRepositoryError>;

/// Task definition persistence contract.
///
/// The queue manager only calls the read methods; `store` and `update` exist
/// for the CRUD layer that owns definitions.
#[async_trait]
pub trait TaskDefinitionRepository: Send + Sync {
    /// Stores a new definition.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDefinitionRepositoryError::DuplicateDefinition`] when the
    /// identifier already exists.
    async fn store(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()>;

    /// Persists changes to an existing definition.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDefinitionRepositoryError::NotFound`] when the definition
    /// does not exist.
    async fn update(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()>;

    /// Finds a definition by identifier.
    ///
    /// Returns `None` when the definition does not exist.
    async fn find_by_id(
        &self,
        id: TaskDefinitionId,
    ) -> TaskDefinitionRepositoryResult<Option<TaskDefinition>>;

    /// Returns every enabled definition that has a schedule.
    async fn list_scheduled(&self) -> TaskDefinitionRepositoryResult<Vec<TaskDefinition>>;
}

/// Errors returned by task definition repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskDefinitionRepositoryError {
    /// A definition with the same identifier already exists.
    #[error("duplicate task definition identifier: {0}")]
    DuplicateDefinition(TaskDefinitionId),

    /// The definition was not found.
    #[error("task definition not found: {0}")]
    NotFound(TaskDefinitionId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskDefinitionRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
