//! Watchdog sweeps over stale executions.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use eyre::ensure;
use rstest::rstest;
use scrapeyard::{
    config::ScrapeyardConfig,
    definition::domain::TargetSite,
    execution::{
        domain::{ExecutionStatus, LogLevel, LogSource, TriggerType},
        services::{ExecutionWatchdog, WatchdogPolicy},
    },
};
use tokio_util::sync::CancellationToken;

use super::helpers::{ManualClock, QueueHarness, harness};
use scrapeyard::{
    definition::adapters::memory::InMemoryTaskDefinitionRepository,
    execution::adapters::{RecordingDispatcher, memory::InMemoryExecutionStore},
};

type TestWatchdog = ExecutionWatchdog<
    InMemoryTaskDefinitionRepository,
    InMemoryExecutionStore,
    InMemoryExecutionStore,
    RecordingDispatcher,
    ManualClock,
>;

fn watchdog(harness: &QueueHarness, queued_timeout: Option<Duration>) -> TestWatchdog {
    ExecutionWatchdog::new(
        Arc::clone(&harness.queue),
        Arc::clone(&harness.clock),
        WatchdogPolicy {
            running_timeout: Duration::from_secs(600),
            queued_timeout,
            sweep_interval: Duration::from_millis(10),
        },
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn overdue_running_execution_is_failed(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("amazon desks", TargetSite::Amazon).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.mark_started(execution.id()).await?;
    harness.clock.advance(TimeDelta::seconds(601));

    let expired = watchdog(&harness, None).sweep_once().await?;

    ensure!(expired.len() == 1);
    let detail = harness.queue.get_detail(execution.id()).await?;
    ensure!(detail.execution.status() == ExecutionStatus::Failed);
    let reason = detail
        .execution
        .failure_reason()
        .map(|reason| reason.as_str().to_owned())
        .unwrap_or_default();
    ensure!(reason.contains("timeout"), "reason was {reason:?}");
    ensure!(
        detail
            .recent_logs
            .iter()
            .any(|entry| entry.source == LogSource::System && entry.level == LogLevel::Error)
    );
    let token = harness
        .dispatcher
        .token_for(execution.id())
        .ok_or_else(|| eyre::eyre!("missing worker token"))?;
    ensure!(token.is_cancelled());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn execution_within_threshold_is_left_alone(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("ebay guitars", TargetSite::Ebay).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.mark_started(execution.id()).await?;
    harness.clock.advance(TimeDelta::seconds(599));

    let expired = watchdog(&harness, None).sweep_once().await?;

    ensure!(expired.is_empty());
    let detail = harness.queue.get_detail(execution.id()).await?;
    ensure!(detail.execution.status() == ExecutionStatus::Running);
    Ok(())
}

#[rstest]
#[case(None, ExecutionStatus::Queued)]
#[case(Some(Duration::from_secs(60)), ExecutionStatus::Failed)]
#[tokio::test(flavor = "multi_thread")]
async fn queued_threshold_is_optional(
    harness: QueueHarness,
    #[case] queued_timeout: Option<Duration>,
    #[case] expected: ExecutionStatus,
) -> eyre::Result<()> {
    let definition = harness.definition("etsy quilts", TargetSite::Etsy).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.clock.advance(TimeDelta::seconds(3_600));

    watchdog(&harness, queued_timeout).sweep_once().await?;

    let detail = harness.queue.get_detail(execution.id()).await?;
    ensure!(detail.execution.status() == expected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn terminal_executions_are_never_swept(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("walmart tents", TargetSite::Walmart).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.mark_started(execution.id()).await?;
    harness.queue.complete(execution.id()).await?;
    harness.clock.advance(TimeDelta::days(2));

    let expired = watchdog(&harness, Some(Duration::from_secs(1)))
        .sweep_once()
        .await?;

    ensure!(expired.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_loop_stops_on_shutdown(harness: QueueHarness) -> eyre::Result<()> {
    let sweeper = watchdog(&harness, None);
    let shutdown = CancellationToken::new();
    let stop = shutdown.clone();
    let handle = tokio::spawn(async move { sweeper.run(stop).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn default_policy_frees_definition_of_silent_worker(
    harness: QueueHarness,
) -> eyre::Result<()> {
    let definition = harness.definition("aliexpress lamps", TargetSite::AliExpress).await?;
    let silent = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.clock.advance(TimeDelta::days(30));
    let sweeper = ExecutionWatchdog::new(
        Arc::clone(&harness.queue),
        Arc::clone(&harness.clock),
        ScrapeyardConfig::default().watchdog_policy(),
    );

    let expired = sweeper.sweep_once().await?;

    ensure!(expired.len() == 1, "expired {} executions", expired.len());
    let detail = harness.queue.get_detail(silent.id()).await?;
    ensure!(detail.execution.status() == ExecutionStatus::Failed);
    let next = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    ensure!(next.status() == ExecutionStatus::Queued);
    Ok(())
}
