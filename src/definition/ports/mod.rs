//! Port contracts for the task definition store.

pub mod repository;

pub use repository::{
    TaskDefinitionRepository, TaskDefinitionRepositoryError, TaskDefinitionRepositoryResult,
};
