//! Log appends against the `PostgreSQL` sink.

use crate::postgres::helpers::{PgContext, PostgresCluster, postgres_cluster, test_runtime};
use chrono::{TimeDelta, TimeZone, Utc};
use mockable::DefaultClock;
use rstest::rstest;
use scrapeyard::{
    definition::domain::TargetSite,
    execution::{
        domain::{ExecutionId, LogLevel, LogMessage, LogSource, NewLogEntry, TriggerType},
        ports::{LogSink, LogSinkError},
        services::AppendLogRequest,
    },
};

#[rstest]
fn append_after_cancel_from_another_instance_is_tagged(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let other = ctx.another_instance().expect("second manager instance");
    let rt = test_runtime().expect("tokio runtime");
    let definition = rt
        .block_on(ctx.stored_definition("ebay watches", TargetSite::Ebay))
        .expect("definition");
    let execution = rt
        .block_on(ctx.manager.queue.enqueue(definition.id(), TriggerType::Manual))
        .expect("enqueue");
    rt.block_on(ctx.manager.queue.mark_started(execution.id()))
        .expect("start");
    let before = rt
        .block_on(ctx.manager.queue.append_log(AppendLogRequest::new(
            execution.id(),
            "info",
            "page 1 scraped",
        )))
        .expect("append before cancel");

    rt.block_on(other.queue.cancel(execution.id()))
        .expect("cancel via second instance");
    let after = rt
        .block_on(ctx.manager.queue.append_log(AppendLogRequest::new(
            execution.id(),
            "info",
            "page 2 scraped",
        )))
        .expect("append after cancel");

    assert!(!before.post_cancellation);
    assert!(after.post_cancellation);
    let logs = rt
        .block_on(ctx.manager.queue.logs(execution.id()))
        .expect("logs");
    let tagged: Vec<_> = logs
        .iter()
        .filter(|entry| entry.post_cancellation)
        .map(|entry| entry.message.as_str())
        .collect();
    assert_eq!(tagged, ["page 2 scraped"]);
    assert!(
        logs.iter()
            .any(|entry| entry.source == LogSource::System && !entry.post_cancellation),
        "cancellation audit entry missing: {logs:?}"
    );
}

#[rstest]
fn entries_sharing_a_timestamp_keep_arrival_order(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let rt = test_runtime().expect("tokio runtime");
    let definition = rt
        .block_on(ctx.stored_definition("walmart rugs", TargetSite::Walmart))
        .expect("definition");
    let execution = rt
        .block_on(ctx.manager.queue.enqueue(definition.id(), TriggerType::Manual))
        .expect("enqueue");
    let shared = Utc
        .with_ymd_and_hms(2026, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    let earlier = shared - TimeDelta::seconds(30);
    let reported = [("second", shared), ("third", shared), ("first", earlier)];
    for (message, timestamp) in reported {
        rt.block_on(ctx.manager.queue.append_log(
            AppendLogRequest::new(execution.id(), "debug", message).with_timestamp(timestamp),
        ))
        .expect("append");
    }

    let logs = rt
        .block_on(ctx.manager.store.list_all(execution.id()))
        .expect("logs");
    let messages: Vec<_> = logs.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(messages, ["first", "second", "third"]);
    let recent = rt
        .block_on(ctx.manager.store.recent(execution.id(), 2))
        .expect("recent");
    let recent_messages: Vec<_> = recent.iter().map(|entry| entry.message.as_str()).collect();
    assert_eq!(recent_messages, ["second", "third"]);
}

#[rstest]
fn append_for_unknown_execution_writes_nothing(postgres_cluster: PostgresCluster) {
    let ctx = PgContext::new(postgres_cluster).expect("test database");
    let rt = test_runtime().expect("tokio runtime");
    let missing = ExecutionId::new();
    let entry = NewLogEntry::from_worker(
        missing,
        LogLevel::Error,
        LogMessage::new("orphaned line").expect("message"),
        None,
        None,
        &DefaultClock,
    );

    let result = rt.block_on(ctx.manager.store.append(&entry));

    assert!(
        matches!(result, Err(LogSinkError::UnknownExecution(id)) if id == missing),
        "expected UnknownExecution, got {result:?}"
    );
}
