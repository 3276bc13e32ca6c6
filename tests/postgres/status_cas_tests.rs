//! Compare-and-swap status updates against a shared row.

use crate::postgres::helpers::{PgContext, PostgresCluster, postgres_cluster, test_runtime};
use mockable::{Clock, DefaultClock};
use rstest::rstest;
use scrapeyard::{
    definition::domain::{TargetSite, TaskDefinitionId},
    execution::{
        domain::{ExecutionStatus, FailureReason, NewLogEntry, TaskExecution, TriggerType},
        ports::{ExecutionLedger, LedgerError, LogSink, StatusChange},
        services::TaskQueueError,
    },
};

#[rstest]
fn stale_expected_status_conflicts_and_writes_nothing(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let rt = test_runtime().expect("tokio runtime");
    let definition = rt
        .block_on(ctx.stored_definition("shopify mugs", TargetSite::Shopify))
        .expect("definition");
    let store = &ctx.manager.store;
    let queued = TaskExecution::queue(definition.id(), TriggerType::Manual, &DefaultClock);
    rt.block_on(store.insert_if_idle(&queued)).expect("insert");

    let mut cancelled = queued.clone();
    let previous = cancelled.cancel(&DefaultClock).expect("cancel transition");
    let audit = NewLogEntry::cancellation_audit(queued.id(), previous, DefaultClock.utc());
    rt.block_on(store.apply_status_change(
        StatusChange::new(&cancelled, ExecutionStatus::Queued).with_log_entry(&audit),
    ))
    .expect("cancel wins");

    // A second writer still believes the row is queued.
    let mut failed = queued.clone();
    failed
        .fail(FailureReason::new("worker crashed").expect("reason"), &DefaultClock)
        .expect("fail transition");
    let failure = NewLogEntry::failure(
        queued.id(),
        ExecutionStatus::Queued,
        "worker crashed",
        DefaultClock.utc(),
    );
    let result = rt.block_on(store.apply_status_change(
        StatusChange::new(&failed, ExecutionStatus::Queued).with_log_entry(&failure),
    ));

    assert!(
        matches!(
            result,
            Err(LedgerError::StatusConflict {
                expected: ExecutionStatus::Queued,
                actual: ExecutionStatus::Cancelled,
                ..
            })
        ),
        "expected StatusConflict, got {result:?}"
    );
    let stored = rt
        .block_on(store.find_by_id(queued.id()))
        .expect("lookup")
        .expect("row exists");
    assert_eq!(stored.status(), ExecutionStatus::Cancelled);
    assert!(stored.failure_reason().is_none());
    let logs = rt.block_on(store.list_all(queued.id())).expect("logs");
    assert_eq!(logs.len(), 1, "only the cancellation audit is stored: {logs:?}");
}

#[rstest]
fn status_change_for_missing_row_is_not_found(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let rt = test_runtime().expect("tokio runtime");
    let mut ghost = TaskExecution::queue(TaskDefinitionId::new(), TriggerType::Manual, &DefaultClock);
    ghost.mark_running(&DefaultClock).expect("start transition");

    let result = rt.block_on(
        ctx.manager
            .store
            .apply_status_change(StatusChange::new(&ghost, ExecutionStatus::Queued)),
    );

    assert!(
        matches!(result, Err(LedgerError::NotFound(id)) if id == ghost.id()),
        "expected NotFound, got {result:?}"
    );
}

#[rstest]
fn cancel_from_one_instance_beats_completion_from_another(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let other = ctx.another_instance().expect("second manager instance");
    let rt = test_runtime().expect("tokio runtime");
    let definition = rt
        .block_on(ctx.stored_definition("amazon lamps", TargetSite::Amazon))
        .expect("definition");
    let execution = rt
        .block_on(ctx.manager.queue.enqueue(definition.id(), TriggerType::Manual))
        .expect("enqueue");
    rt.block_on(other.queue.mark_started(execution.id()))
        .expect("worker start via second instance");

    rt.block_on(other.queue.cancel(execution.id()))
        .expect("cancel via second instance");
    let result = rt.block_on(ctx.manager.queue.complete(execution.id()));

    assert!(
        matches!(
            result,
            Err(TaskQueueError::InvalidStateTransition {
                from: ExecutionStatus::Cancelled,
                to: ExecutionStatus::Completed,
                ..
            })
        ),
        "expected InvalidStateTransition, got {result:?}"
    );
    let detail = rt
        .block_on(ctx.manager.queue.get_detail(execution.id()))
        .expect("detail");
    assert_eq!(detail.execution.status(), ExecutionStatus::Cancelled);
}
