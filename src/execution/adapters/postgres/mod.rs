//! `PostgreSQL` adapters for the execution ledger and log sink.
//!
//! The single-flight guard is enforced twice: inserts lock the owning
//! definition row for the duration of the check-and-insert transaction, and
//! the partial unique index `idx_task_executions_single_flight` rejects a
//! second active row even from writers that bypass this adapter.

mod blocking;
mod models;
mod schema;
mod store;

pub use blocking::ExecutionPgPool;
pub use store::PostgresExecutionStore;
