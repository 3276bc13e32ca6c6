//! Stale execution lookup used by the watchdog.

use crate::postgres::helpers::{PgContext, PostgresCluster, postgres_cluster, test_runtime};
use chrono::{DateTime, TimeDelta, Utc};
use rstest::rstest;
use scrapeyard::{
    definition::domain::TargetSite,
    execution::{
        domain::{
            ExecutionId, ExecutionStatus, PersistedExecutionData, TaskExecution, TriggerType,
        },
        ports::ExecutionLedger,
    },
};
use std::collections::HashSet;

fn persisted(
    ctx: &PgContext,
    rt: &tokio::runtime::Runtime,
    name: &str,
    status: ExecutionStatus,
    age: TimeDelta,
) -> ExecutionId {
    let definition = rt
        .block_on(ctx.stored_definition(name, TargetSite::Amazon))
        .expect("definition");
    let at: DateTime<Utc> = Utc::now() - age;
    let execution = TaskExecution::from_persisted(PersistedExecutionData {
        id: ExecutionId::new(),
        definition_id: definition.id(),
        status,
        trigger_type: TriggerType::Scheduled,
        created_at: at,
        started_at: (status != ExecutionStatus::Queued).then_some(at),
        completed_at: status.is_terminal().then_some(at),
        failure_reason: None,
        updated_at: at,
    });
    rt.block_on(ctx.manager.store.insert_if_idle(&execution))
        .expect("insert");
    execution.id()
}

#[rstest]
#[case::with_queued_cutoff(true)]
#[case::running_only(false)]
fn stale_lookup_returns_only_old_active_rows(
    postgres_cluster: PostgresCluster,
    #[case] include_queued: bool,
) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let rt = test_runtime().expect("tokio runtime");
    let hours = TimeDelta::hours;
    let old_running = persisted(&ctx, &rt, "old running", ExecutionStatus::Running, hours(3));
    let old_queued = persisted(&ctx, &rt, "old queued", ExecutionStatus::Queued, hours(3));
    persisted(&ctx, &rt, "fresh running", ExecutionStatus::Running, TimeDelta::minutes(5));
    persisted(&ctx, &rt, "fresh queued", ExecutionStatus::Queued, TimeDelta::minutes(5));
    persisted(&ctx, &rt, "old completed", ExecutionStatus::Completed, hours(5));
    persisted(&ctx, &rt, "old cancelled", ExecutionStatus::Cancelled, hours(5));

    let cutoff = Utc::now() - hours(1);
    let queued_cutoff = include_queued.then_some(cutoff);
    let stale = rt
        .block_on(ctx.manager.store.find_stale(cutoff, queued_cutoff))
        .expect("stale lookup");

    let found: HashSet<_> = stale.iter().map(TaskExecution::id).collect();
    let mut expected = HashSet::from([old_running]);
    if include_queued {
        expected.insert(old_queued);
    }
    assert_eq!(found, expected);
}
