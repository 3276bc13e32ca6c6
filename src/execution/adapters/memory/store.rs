//! In-memory execution ledger and log sink sharing one lock.
//!
//! Keeping both ports behind a single `RwLock` makes the single-flight check
//! and insert one critical section, and lets a status change and its audit
//! entry land together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::definition::domain::TaskDefinitionId;
use crate::execution::{
    domain::{
        ExecutionFilter, ExecutionId, ExecutionPage, ExecutionStatus, NewLogEntry, PageRequest,
        SortOrder, TaskExecution, TaskLogEntry,
    },
    ports::{
        ActiveExecution, ExecutionLedger, LedgerError, LedgerResult, LogSink, LogSinkError,
        LogSinkResult, StatusChange,
    },
};

/// Thread-safe in-memory execution store.
///
/// Implements both [`ExecutionLedger`] and [`LogSink`]; clone the handle to
/// share the same state between the two roles.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionStore {
    state: Arc<RwLock<InMemoryExecutionState>>,
}

#[derive(Debug, Default)]
struct InMemoryExecutionState {
    executions: HashMap<ExecutionId, TaskExecution>,
    active_by_definition: HashMap<TaskDefinitionId, ExecutionId>,
    logs: HashMap<ExecutionId, Vec<TaskLogEntry>>,
    next_sequence: i64,
}

impl InMemoryExecutionState {
    fn active_for(&self, definition_id: TaskDefinitionId) -> Option<&TaskExecution> {
        self.active_by_definition
            .get(&definition_id)
            .and_then(|id| self.executions.get(id))
            .filter(|execution| execution.status().is_active())
    }

    fn push_log(&mut self, entry: &NewLogEntry, post_cancellation: bool) -> TaskLogEntry {
        self.next_sequence += 1;
        let stored = entry.clone().into_stored(self.next_sequence, post_cancellation);
        self.logs
            .entry(entry.execution_id)
            .or_default()
            .push(stored.clone());
        stored
    }

    fn sorted_logs(&self, execution_id: ExecutionId) -> Vec<TaskLogEntry> {
        let mut entries = self.logs.get(&execution_id).cloned().unwrap_or_default();
        entries.sort_by_key(TaskLogEntry::order_key);
        entries
    }
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn ledger_lock_error(err: impl std::fmt::Display) -> LedgerError {
    LedgerError::persistence(std::io::Error::other(err.to_string()))
}

fn sink_lock_error(err: impl std::fmt::Display) -> LogSinkError {
    LogSinkError::persistence(std::io::Error::other(err.to_string()))
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait]
impl ExecutionLedger for InMemoryExecutionStore {
    async fn insert_if_idle(&self, execution: &TaskExecution) -> LedgerResult<()> {
        let mut state = self.state.write().map_err(ledger_lock_error)?;
        if state.executions.contains_key(&execution.id()) {
            return Err(LedgerError::DuplicateExecution(execution.id()));
        }

        let definition_id = execution.definition_id();
        if let Some(active) = state.active_for(definition_id) {
            return Err(LedgerError::DefinitionBusy {
                definition_id,
                active: ActiveExecution {
                    execution_id: active.id(),
                    status: active.status(),
                },
            });
        }

        if execution.status().is_active() {
            state
                .active_by_definition
                .insert(definition_id, execution.id());
        }
        state.executions.insert(execution.id(), execution.clone());
        Ok(())
    }

    async fn apply_status_change(&self, change: StatusChange<'_>) -> LedgerResult<()> {
        let mut state = self.state.write().map_err(ledger_lock_error)?;
        let execution = change.execution;
        let stored = state
            .executions
            .get(&execution.id())
            .ok_or(LedgerError::NotFound(execution.id()))?;

        if stored.status() != change.expected {
            return Err(LedgerError::StatusConflict {
                execution_id: execution.id(),
                expected: change.expected,
                actual: stored.status(),
            });
        }

        if execution.status().is_terminal()
            && state.active_by_definition.get(&execution.definition_id()) == Some(&execution.id())
        {
            state.active_by_definition.remove(&execution.definition_id());
        }
        state.executions.insert(execution.id(), execution.clone());

        if let Some(entry) = change.log_entry {
            state.push_log(entry, false);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ExecutionId) -> LedgerResult<Option<TaskExecution>> {
        let state = self.state.read().map_err(ledger_lock_error)?;
        Ok(state.executions.get(&id).cloned())
    }

    async fn find_active(
        &self,
        definition_id: TaskDefinitionId,
    ) -> LedgerResult<Option<TaskExecution>> {
        let state = self.state.read().map_err(ledger_lock_error)?;
        Ok(state.active_for(definition_id).cloned())
    }

    async fn list(
        &self,
        filter: ExecutionFilter,
        order: SortOrder,
        page: PageRequest,
    ) -> LedgerResult<ExecutionPage> {
        let state = self.state.read().map_err(ledger_lock_error)?;
        let mut matching: Vec<TaskExecution> = state
            .executions
            .values()
            .filter(|execution| filter.matches(execution))
            .cloned()
            .collect();
        matching.sort_by_key(|execution| (execution.created_at(), execution.id()));
        if order == SortOrder::NewestFirst {
            matching.reverse();
        }

        let total = u64::try_from(matching.len()).map_err(LedgerError::persistence)?;
        let items = matching
            .into_iter()
            .skip(to_usize(page.offset()))
            .take(to_usize(u64::from(page.per_page())))
            .collect();
        Ok(ExecutionPage { items, total, page })
    }

    async fn find_stale(
        &self,
        started_before: DateTime<Utc>,
        queued_before: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TaskExecution>> {
        let state = self.state.read().map_err(ledger_lock_error)?;
        let mut stale: Vec<TaskExecution> = state
            .executions
            .values()
            .filter(|execution| match execution.status() {
                ExecutionStatus::Running => execution
                    .started_at()
                    .is_some_and(|started| started < started_before),
                ExecutionStatus::Queued => {
                    queued_before.is_some_and(|cutoff| execution.created_at() < cutoff)
                }
                _ => false,
            })
            .cloned()
            .collect();
        stale.sort_by_key(TaskExecution::created_at);
        Ok(stale)
    }
}

#[async_trait]
impl LogSink for InMemoryExecutionStore {
    async fn append(&self, entry: &NewLogEntry) -> LogSinkResult<TaskLogEntry> {
        let mut state = self.state.write().map_err(sink_lock_error)?;
        let status = state
            .executions
            .get(&entry.execution_id)
            .map(TaskExecution::status)
            .ok_or(LogSinkError::UnknownExecution(entry.execution_id))?;
        Ok(state.push_log(entry, status == ExecutionStatus::Cancelled))
    }

    async fn recent(
        &self,
        execution_id: ExecutionId,
        limit: u32,
    ) -> LogSinkResult<Vec<TaskLogEntry>> {
        let state = self.state.read().map_err(sink_lock_error)?;
        let entries = state.sorted_logs(execution_id);
        let skip = entries.len().saturating_sub(to_usize(u64::from(limit)));
        Ok(entries.into_iter().skip(skip).collect())
    }

    async fn list_all(&self, execution_id: ExecutionId) -> LogSinkResult<Vec<TaskLogEntry>> {
        let state = self.state.read().map_err(sink_lock_error)?;
        Ok(state.sorted_logs(execution_id))
    }
}
