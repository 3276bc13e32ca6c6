//! Log ingestion: timestamps, ordering and post-cancellation tagging.

use chrono::{TimeDelta, TimeZone, Utc};
use eyre::ensure;
use mockable::Clock;
use rstest::rstest;
use scrapeyard::{
    definition::domain::TargetSite,
    execution::{
        domain::{ExecutionId, ExecutionStatus, LogLevel, LogSource, TriggerType},
        ports::LogSink,
        services::{AppendLogRequest, QueryLimits, TaskQueueError},
        wire::LogIngestRequest,
    },
};

use super::helpers::{QueueHarness, harness};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_timestamp_uses_ingestion_time(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("amazon lamps", TargetSite::Amazon).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.clock.advance(TimeDelta::seconds(42));
    let expected = harness.clock.utc();

    let stored = harness
        .queue
        .append_log(AppendLogRequest::new(execution.id(), "info", "page 1 fetched"))
        .await?;

    ensure!(stored.timestamp == expected);
    ensure!(stored.level == LogLevel::Info);
    ensure!(stored.source == LogSource::Worker);
    ensure!(!stored.post_cancellation);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn entries_are_ordered_by_timestamp_then_arrival(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("ebay drones", TargetSite::Ebay).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    let base = Utc
        .with_ymd_and_hms(2026, 6, 1, 8, 0, 0)
        .single()
        .ok_or_else(|| eyre::eyre!("invalid base instant"))?;
    let later = base + TimeDelta::seconds(5);

    for (message, timestamp) in [
        ("third", later),
        ("first", base),
        ("second", base),
    ] {
        harness
            .queue
            .append_log(AppendLogRequest::new(execution.id(), "debug", message).with_timestamp(timestamp))
            .await?;
    }

    let messages: Vec<String> = harness
        .queue
        .logs(execution.id())
        .await?
        .into_iter()
        .map(|entry| entry.message.as_str().to_owned())
        .collect();
    ensure!(messages == ["first", "second", "third"], "got {messages:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn logs_after_cancellation_are_kept_and_tagged(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("etsy candles", TargetSite::Etsy).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.mark_started(execution.id()).await?;
    harness
        .queue
        .append_log(AppendLogRequest::new(execution.id(), "info", "before"))
        .await?;
    harness.queue.cancel(execution.id()).await?;

    let late = harness
        .queue
        .append_log(AppendLogRequest::new(execution.id(), "warning", "shutting down"))
        .await?;

    ensure!(late.post_cancellation);
    let detail = harness.queue.get_detail(execution.id()).await?;
    ensure!(detail.execution.status() == ExecutionStatus::Cancelled);
    let tagged = detail
        .recent_logs
        .iter()
        .filter(|entry| entry.post_cancellation)
        .count();
    ensure!(tagged == 1);
    ensure!(detail.recent_logs.len() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_execution_is_not_found_and_writes_nothing(
    harness: QueueHarness,
) -> eyre::Result<()> {
    let missing = ExecutionId::new();

    let result = harness
        .queue
        .append_log(AppendLogRequest::new(missing, "info", "orphan"))
        .await;

    ensure!(matches!(result, Err(TaskQueueError::ExecutionNotFound(id)) if id == missing));
    ensure!(harness.store.list_all(missing).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn worker_payload_is_ingested_with_context(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("walmart bikes", TargetSite::Walmart).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    let payload = format!(
        r#"{{"executionId":"{}","level":"ERROR","message":"captcha wall","context":{{"page":3}}}}"#,
        execution.id()
    );

    let stored = harness
        .queue
        .ingest(LogIngestRequest::from_json(&payload)?)
        .await?;

    ensure!(stored.level == LogLevel::Error);
    ensure!(stored.context == Some(serde_json::json!({"page": 3})));
    let reloaded = harness.queue.get_detail(execution.id()).await?;
    ensure!(reloaded.execution.status() == ExecutionStatus::Queued);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn detail_shows_only_the_latest_entries() -> eyre::Result<()> {
    let harness = QueueHarness::with_limits(QueryLimits {
        detail_log_limit: 2,
        ..QueryLimits::default()
    });
    let definition = harness.definition("shopify hats", TargetSite::Shopify).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    for message in ["one", "two", "three"] {
        harness.clock.advance(TimeDelta::seconds(1));
        harness
            .queue
            .append_log(AppendLogRequest::new(execution.id(), "info", message))
            .await?;
    }

    let detail = harness.queue.get_detail(execution.id()).await?;

    let messages: Vec<&str> = detail
        .recent_logs
        .iter()
        .map(|entry| entry.message.as_str())
        .collect();
    ensure!(messages == ["two", "three"], "got {messages:?}");
    Ok(())
}
