//! In-memory adapters for task definitions.

mod definition;

pub use definition::InMemoryTaskDefinitionRepository;
