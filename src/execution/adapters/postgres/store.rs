//! `PostgreSQL` execution ledger and log sink.

use super::{
    blocking::{ExecutionPgPool, PooledConn, get_conn_with, run_blocking_with},
    models::{ExecutionRow, ExecutionStatusChangeset, LogRow, NewExecutionRow, NewLogRow},
    schema::{task_definitions, task_executions, task_logs},
};
use crate::definition::domain::TaskDefinitionId;
use crate::execution::{
    domain::{
        ExecutionFilter, ExecutionId, ExecutionPage, ExecutionStatus, FailureReason, LogEntryId,
        LogLevel, LogMessage, LogSource, NewLogEntry, PageRequest, PersistedExecutionData,
        SortOrder, TaskExecution, TaskLogEntry, TriggerType,
    },
    ports::{
        ActiveExecution, ExecutionLedger, LedgerError, LedgerResult, LogSink, LogSinkError,
        LogSinkResult, StatusChange,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Name of the partial unique index backing the single-flight guard.
const SINGLE_FLIGHT_INDEX: &str = "idx_task_executions_single_flight";

/// `PostgreSQL`-backed execution store.
///
/// Implements both [`ExecutionLedger`] and [`LogSink`] over one pool so a
/// status change and its audit entry commit in the same transaction.
#[derive(Debug, Clone)]
pub struct PostgresExecutionStore {
    pool: ExecutionPgPool,
}

impl PostgresExecutionStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ExecutionPgPool) -> Self {
        Self { pool }
    }

    async fn run_ledger<F, T>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut PgConnection) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        run_blocking_with(
            move || {
                let mut conn: PooledConn = get_conn_with(&pool, LedgerError::persistence)?;
                f(&mut conn)
            },
            LedgerError::persistence,
        )
        .await
    }

    async fn run_sink<F, T>(&self, f: F) -> LogSinkResult<T>
    where
        F: FnOnce(&mut PgConnection) -> LogSinkResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        run_blocking_with(
            move || {
                let mut conn: PooledConn = get_conn_with(&pool, LogSinkError::persistence)?;
                f(&mut conn)
            },
            LogSinkError::persistence,
        )
        .await
    }
}

impl From<DieselError> for LedgerError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

impl From<DieselError> for LogSinkError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

/// Failure modes of the single-flight insert transaction.
#[derive(Debug)]
enum InsertFailure {
    Ledger(LedgerError),
    /// The partial unique index rejected the row; the transaction is aborted
    /// so the conflicting execution must be read on a fresh statement.
    SlotTaken,
}

impl From<DieselError> for InsertFailure {
    fn from(err: DieselError) -> Self {
        Self::Ledger(LedgerError::persistence(err))
    }
}

impl From<LedgerError> for InsertFailure {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

#[async_trait]
impl ExecutionLedger for PostgresExecutionStore {
    async fn insert_if_idle(&self, execution: &TaskExecution) -> LedgerResult<()> {
        let execution_id = execution.id();
        let definition_id = execution.definition_id();
        let row = to_new_row(execution);
        self.run_ledger(move |conn| {
            let outcome = conn.transaction::<_, InsertFailure, _>(|tx| {
                let locked = task_definitions::table
                    .filter(task_definitions::id.eq(definition_id.into_inner()))
                    .select(task_definitions::id)
                    .for_update()
                    .first::<uuid::Uuid>(tx)
                    .optional()?;
                if locked.is_none() {
                    return Err(LedgerError::UnknownDefinition(definition_id).into());
                }

                if let Some(active) = load_active(tx, definition_id)? {
                    return Err(busy(definition_id, &active).into());
                }

                diesel::insert_into(task_executions::table)
                    .values(&row)
                    .execute(tx)
                    .map_err(|err| map_insert_error(err, execution_id))?;
                Ok(())
            });

            match outcome {
                Ok(()) => Ok(()),
                Err(InsertFailure::Ledger(err)) => Err(err),
                Err(InsertFailure::SlotTaken) => match load_active(conn, definition_id)? {
                    Some(active) => Err(busy(definition_id, &active)),
                    None => Err(LedgerError::persistence(std::io::Error::other(format!(
                        "single-flight index rejected execution {execution_id} but no active \
                         execution exists for definition {definition_id}"
                    )))),
                },
            }
        })
        .await
    }

    async fn apply_status_change(&self, change: StatusChange<'_>) -> LedgerResult<()> {
        let execution_id = change.execution.id();
        let expected = change.expected;
        let changeset = to_status_changeset(change.execution);
        let log_row = change.log_entry.map(|entry| to_new_log_row(entry, false));
        self.run_ledger(move |conn| {
            conn.transaction::<_, LedgerError, _>(|tx| {
                let updated = diesel::update(
                    task_executions::table
                        .filter(task_executions::id.eq(execution_id.into_inner()))
                        .filter(task_executions::status.eq(expected.as_str())),
                )
                .set(&changeset)
                .execute(tx)?;

                if updated == 0 {
                    let actual = task_executions::table
                        .filter(task_executions::id.eq(execution_id.into_inner()))
                        .select(task_executions::status)
                        .first::<String>(tx)
                        .optional()?;
                    return Err(match actual {
                        None => LedgerError::NotFound(execution_id),
                        Some(stored) => LedgerError::StatusConflict {
                            execution_id,
                            expected,
                            actual: ExecutionStatus::try_from(stored.as_str())
                                .map_err(LedgerError::persistence)?,
                        },
                    });
                }

                if let Some(entry) = &log_row {
                    diesel::insert_into(task_logs::table)
                        .values(entry)
                        .execute(tx)?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn find_by_id(&self, id: ExecutionId) -> LedgerResult<Option<TaskExecution>> {
        self.run_ledger(move |conn| {
            let row = task_executions::table
                .filter(task_executions::id.eq(id.into_inner()))
                .select(ExecutionRow::as_select())
                .first::<ExecutionRow>(conn)
                .optional()?;
            row.map(row_to_execution).transpose()
        })
        .await
    }

    async fn find_active(
        &self,
        definition_id: TaskDefinitionId,
    ) -> LedgerResult<Option<TaskExecution>> {
        self.run_ledger(move |conn| load_active(conn, definition_id))
            .await
    }

    async fn list(
        &self,
        filter: ExecutionFilter,
        order: SortOrder,
        page: PageRequest,
    ) -> LedgerResult<ExecutionPage> {
        let limit = i64::from(page.per_page());
        let offset = i64::try_from(page.offset()).map_err(LedgerError::persistence)?;
        self.run_ledger(move |conn| {
            let count = filtered(filter).count().get_result::<i64>(conn)?;
            let total = u64::try_from(count).map_err(LedgerError::persistence)?;

            let ordered = match order {
                SortOrder::NewestFirst => filtered(filter).order((
                    task_executions::created_at.desc(),
                    task_executions::id.desc(),
                )),
                SortOrder::OldestFirst => filtered(filter).order((
                    task_executions::created_at.asc(),
                    task_executions::id.asc(),
                )),
            };
            let items = ordered
                .limit(limit)
                .offset(offset)
                .select(ExecutionRow::as_select())
                .load::<ExecutionRow>(conn)?
                .into_iter()
                .map(row_to_execution)
                .collect::<LedgerResult<Vec<_>>>()?;
            Ok(ExecutionPage { items, total, page })
        })
        .await
    }

    async fn find_stale(
        &self,
        started_before: DateTime<Utc>,
        queued_before: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<TaskExecution>> {
        self.run_ledger(move |conn| {
            let mut query = task_executions::table
                .filter(
                    task_executions::status
                        .eq(ExecutionStatus::Running.as_str())
                        .and(task_executions::started_at.lt(started_before)),
                )
                .into_boxed::<Pg>();
            if let Some(cutoff) = queued_before {
                query = query.or_filter(
                    task_executions::status
                        .eq(ExecutionStatus::Queued.as_str())
                        .and(task_executions::created_at.lt(cutoff)),
                );
            }
            query
                .order(task_executions::created_at.asc())
                .select(ExecutionRow::as_select())
                .load::<ExecutionRow>(conn)?
                .into_iter()
                .map(row_to_execution)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl LogSink for PostgresExecutionStore {
    async fn append(&self, entry: &NewLogEntry) -> LogSinkResult<TaskLogEntry> {
        let pending = entry.clone();
        self.run_sink(move |conn| {
            conn.transaction::<_, LogSinkError, _>(|tx| {
                // FOR SHARE keeps a concurrent cancel from committing between
                // the status read and the insert.
                let status = task_executions::table
                    .filter(task_executions::id.eq(pending.execution_id.into_inner()))
                    .select(task_executions::status)
                    .for_share()
                    .first::<String>(tx)
                    .optional()?
                    .ok_or(LogSinkError::UnknownExecution(pending.execution_id))?;
                let post_cancellation = ExecutionStatus::try_from(status.as_str())
                    .map_err(LogSinkError::persistence)?
                    == ExecutionStatus::Cancelled;

                let sequence = diesel::insert_into(task_logs::table)
                    .values(&to_new_log_row(&pending, post_cancellation))
                    .returning(task_logs::seq)
                    .get_result::<i64>(tx)?;
                Ok(pending.clone().into_stored(sequence, post_cancellation))
            })
        })
        .await
    }

    async fn recent(
        &self,
        execution_id: ExecutionId,
        limit: u32,
    ) -> LogSinkResult<Vec<TaskLogEntry>> {
        self.run_sink(move |conn| {
            let mut entries = task_logs::table
                .filter(task_logs::execution_id.eq(execution_id.into_inner()))
                .order((task_logs::logged_at.desc(), task_logs::seq.desc()))
                .limit(i64::from(limit))
                .select(LogRow::as_select())
                .load::<LogRow>(conn)?
                .into_iter()
                .map(row_to_log_entry)
                .collect::<LogSinkResult<Vec<_>>>()?;
            entries.reverse();
            Ok(entries)
        })
        .await
    }

    async fn list_all(&self, execution_id: ExecutionId) -> LogSinkResult<Vec<TaskLogEntry>> {
        self.run_sink(move |conn| {
            task_logs::table
                .filter(task_logs::execution_id.eq(execution_id.into_inner()))
                .order((task_logs::logged_at.asc(), task_logs::seq.asc()))
                .select(LogRow::as_select())
                .load::<LogRow>(conn)?
                .into_iter()
                .map(row_to_log_entry)
                .collect()
        })
        .await
    }
}

fn filtered(filter: ExecutionFilter) -> task_executions::BoxedQuery<'static, Pg> {
    let mut query = task_executions::table.into_boxed::<Pg>();
    if let Some(definition_id) = filter.definition_id {
        query = query.filter(task_executions::definition_id.eq(definition_id.into_inner()));
    }
    if let Some(status) = filter.status {
        query = query.filter(task_executions::status.eq(status.as_str()));
    }
    if let Some(trigger_type) = filter.trigger_type {
        query = query.filter(task_executions::trigger_type.eq(trigger_type.as_str()));
    }
    query
}

fn load_active(
    conn: &mut PgConnection,
    definition_id: TaskDefinitionId,
) -> LedgerResult<Option<TaskExecution>> {
    let active_statuses = ExecutionStatus::ACTIVE.map(ExecutionStatus::as_str);
    let row = task_executions::table
        .filter(task_executions::definition_id.eq(definition_id.into_inner()))
        .filter(task_executions::status.eq_any(active_statuses))
        .select(ExecutionRow::as_select())
        .first::<ExecutionRow>(conn)
        .optional()?;
    row.map(row_to_execution).transpose()
}

fn busy(definition_id: TaskDefinitionId, active: &TaskExecution) -> LedgerError {
    LedgerError::DefinitionBusy {
        definition_id,
        active: ActiveExecution {
            execution_id: active.id(),
            status: active.status(),
        },
    }
}

fn map_insert_error(err: DieselError, execution_id: ExecutionId) -> InsertFailure {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(SINGLE_FLIGHT_INDEX) =>
        {
            InsertFailure::SlotTaken
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            InsertFailure::Ledger(LedgerError::DuplicateExecution(execution_id))
        }
        other => InsertFailure::Ledger(LedgerError::persistence(other)),
    }
}

fn to_new_row(execution: &TaskExecution) -> NewExecutionRow {
    NewExecutionRow {
        id: execution.id().into_inner(),
        definition_id: execution.definition_id().into_inner(),
        status: execution.status().as_str().to_owned(),
        trigger_type: execution.trigger_type().as_str().to_owned(),
        created_at: execution.created_at(),
        started_at: execution.started_at(),
        completed_at: execution.completed_at(),
        failure_reason: execution.failure_reason().map(|r| r.as_str().to_owned()),
        updated_at: execution.updated_at(),
    }
}

fn to_status_changeset(execution: &TaskExecution) -> ExecutionStatusChangeset {
    ExecutionStatusChangeset {
        status: execution.status().as_str().to_owned(),
        started_at: execution.started_at(),
        completed_at: execution.completed_at(),
        failure_reason: execution.failure_reason().map(|r| r.as_str().to_owned()),
        updated_at: execution.updated_at(),
    }
}

fn to_new_log_row(entry: &NewLogEntry, post_cancellation: bool) -> NewLogRow {
    NewLogRow {
        id: entry.id.into_inner(),
        execution_id: entry.execution_id.into_inner(),
        level: entry.level.as_str().to_owned(),
        message: entry.message.as_str().to_owned(),
        context: entry.context.clone(),
        logged_at: entry.timestamp,
        source: entry.source.as_str().to_owned(),
        post_cancellation,
    }
}

fn row_to_execution(row: ExecutionRow) -> LedgerResult<TaskExecution> {
    let status =
        ExecutionStatus::try_from(row.status.as_str()).map_err(LedgerError::persistence)?;
    let trigger_type =
        TriggerType::try_from(row.trigger_type.as_str()).map_err(LedgerError::persistence)?;
    let failure_reason = row
        .failure_reason
        .map(FailureReason::new)
        .transpose()
        .map_err(LedgerError::persistence)?;

    Ok(TaskExecution::from_persisted(PersistedExecutionData {
        id: ExecutionId::from_uuid(row.id),
        definition_id: TaskDefinitionId::from_uuid(row.definition_id),
        status,
        trigger_type,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        failure_reason,
        updated_at: row.updated_at,
    }))
}

fn row_to_log_entry(row: LogRow) -> LogSinkResult<TaskLogEntry> {
    let level = LogLevel::try_from(row.level.as_str()).map_err(LogSinkError::persistence)?;
    let source = LogSource::parse(&row.source).ok_or_else(|| {
        LogSinkError::persistence(std::io::Error::other(format!(
            "unknown log source: {}",
            row.source
        )))
    })?;
    let message = LogMessage::new(row.message).map_err(LogSinkError::persistence)?;

    Ok(TaskLogEntry {
        id: LogEntryId::from_uuid(row.id),
        execution_id: ExecutionId::from_uuid(row.execution_id),
        sequence: row.seq,
        level,
        message,
        context: row.context,
        timestamp: row.logged_at,
        source,
        post_cancellation: row.post_cancellation,
    })
}
