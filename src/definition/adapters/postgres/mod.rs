//! `PostgreSQL` adapters for task definition persistence.

mod models;
mod repository;
mod schema;

pub use repository::{DefinitionPgPool, PostgresTaskDefinitionRepository};
