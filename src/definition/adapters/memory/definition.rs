//! In-memory repository for task definitions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::definition::{
    domain::{TaskDefinition, TaskDefinitionId},
    ports::{
        TaskDefinitionRepository, TaskDefinitionRepositoryError, TaskDefinitionRepositoryResult,
    },
};

/// Thread-safe in-memory task definition repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskDefinitionRepository {
    definitions: Arc<RwLock<HashMap<TaskDefinitionId, TaskDefinition>>>,
}

impl InMemoryTaskDefinitionRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl std::fmt::Display) -> TaskDefinitionRepositoryError {
    TaskDefinitionRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskDefinitionRepository for InMemoryTaskDefinitionRepository {
    async fn store(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()> {
        let mut definitions = self.definitions.write().map_err(lock_error)?;
        if definitions.contains_key(&definition.id()) {
            return Err(TaskDefinitionRepositoryError::DuplicateDefinition(
                definition.id(),
            ));
        }
        definitions.insert(definition.id(), definition.clone());
        Ok(())
    }

    async fn update(&self, definition: &TaskDefinition) -> TaskDefinitionRepositoryResult<()> {
        let mut definitions = self.definitions.write().map_err(lock_error)?;
        let slot = definitions
            .get_mut(&definition.id())
            .ok_or(TaskDefinitionRepositoryError::NotFound(definition.id()))?;
        *slot = definition.clone();
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: TaskDefinitionId,
    ) -> TaskDefinitionRepositoryResult<Option<TaskDefinition>> {
        let definitions = self.definitions.read().map_err(lock_error)?;
        Ok(definitions.get(&id).cloned())
    }

    async fn list_scheduled(&self) -> TaskDefinitionRepositoryResult<Vec<TaskDefinition>> {
        let definitions = self.definitions.read().map_err(lock_error)?;
        let mut scheduled: Vec<TaskDefinition> = definitions
            .values()
            .filter(|definition| definition.is_enabled() && definition.schedule().is_some())
            .cloned()
            .collect();
        scheduled.sort_by_key(TaskDefinition::created_at);
        Ok(scheduled)
    }
}
