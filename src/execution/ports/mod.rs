//! Port contracts for the execution ledger, log sink and worker dispatch.
//!
//! Ports define infrastructure-agnostic interfaces used by execution
//! services.

pub mod dispatcher;
pub mod ledger;
pub mod log_sink;

pub use dispatcher::{
    DispatchError, DispatchResult, WorkerAssignment, WorkerDispatcher, WorkerExit,
};
pub use ledger::{
    ActiveExecution, ExecutionLedger, LedgerError, LedgerResult, StatusChange,
};
pub use log_sink::{LogSink, LogSinkError, LogSinkResult};
