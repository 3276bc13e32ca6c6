//! In-memory execution store for tests and single-process deployments.

mod store;

pub use store::InMemoryExecutionStore;
