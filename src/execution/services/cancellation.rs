//! Process-local delivery of cancellation signals to workers.
//!
//! The ledger decides whether an execution is cancelled. This registry only
//! forwards that decision to workers dispatched by this process; a worker
//! launched elsewhere learns about it by polling
//! `TaskQueueService::is_cancellation_requested`.

use crate::execution::domain::ExecutionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Map of in-flight executions to their cancellation tokens.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    tokens: Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<ExecutionId, CancellationToken>> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and tracks the token for a newly dispatched execution.
    #[must_use]
    pub fn register(&self, execution_id: ExecutionId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens().insert(execution_id, token.clone());
        token
    }

    /// Fires and forgets the token of an execution.
    ///
    /// Returns `false` when this process holds no token for it.
    #[must_use]
    pub fn signal(&self, execution_id: ExecutionId) -> bool {
        self.tokens().remove(&execution_id).is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Forgets the token of an execution that ended without cancellation.
    pub fn release(&self, execution_id: ExecutionId) {
        self.tokens().remove(&execution_id);
    }

    /// Returns whether a token is tracked for the execution.
    #[must_use]
    pub fn is_tracked(&self, execution_id: ExecutionId) -> bool {
        self.tokens().contains_key(&execution_id)
    }
}
