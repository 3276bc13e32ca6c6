//! Cancellation semantics: audit trail, worker signalling and terminal wins.

use super::helpers::{QueueHarness, harness};
use eyre::ensure;
use rstest::rstest;
use scrapeyard::{
    definition::domain::TargetSite,
    execution::{
        domain::{ExecutionId, ExecutionStatus, LogLevel, LogSource, TriggerType},
        services::TaskQueueError,
    },
};

#[rstest]
#[case(false, "queued")]
#[case(true, "running")]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_records_previous_status_in_audit_entry(
    harness: QueueHarness,
    #[case] start_first: bool,
    #[case] expected_previous: &str,
) -> eyre::Result<()> {
    let definition = harness.definition("ebay watches", TargetSite::Ebay).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    if start_first {
        harness.queue.mark_started(execution.id()).await?;
    }

    let cancelled = harness.queue.cancel(execution.id()).await?;

    ensure!(cancelled.status() == ExecutionStatus::Cancelled);
    ensure!(cancelled.completed_at().is_some());
    let logs = harness.queue.logs(execution.id()).await?;
    ensure!(logs.len() == 1, "expected one audit entry, got {}", logs.len());
    let audit = logs
        .first()
        .ok_or_else(|| eyre::eyre!("missing audit entry"))?;
    ensure!(audit.source == LogSource::System);
    ensure!(audit.level == LogLevel::Warning);
    let previous = audit
        .context
        .as_ref()
        .and_then(|context| context.get("previous_status"))
        .and_then(serde_json::Value::as_str);
    ensure!(previous == Some(expected_previous), "audit context: {:?}", audit.context);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_fires_the_dispatched_token(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("etsy rings", TargetSite::Etsy).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    let token = harness
        .dispatcher
        .token_for(execution.id())
        .ok_or_else(|| eyre::eyre!("no token handed to the worker"))?;
    ensure!(!token.is_cancelled());
    ensure!(!harness.queue.is_cancellation_requested(execution.id()).await?);

    harness.queue.cancel(execution.id()).await?;

    ensure!(token.is_cancelled());
    ensure!(harness.queue.is_cancellation_requested(execution.id()).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn late_completion_after_cancel_is_rejected(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("amazon kettles", TargetSite::Amazon).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.mark_started(execution.id()).await?;
    harness.queue.cancel(execution.id()).await?;

    let result = harness.queue.complete(execution.id()).await;

    ensure!(matches!(
        result,
        Err(TaskQueueError::InvalidStateTransition {
            from: ExecutionStatus::Cancelled,
            to: ExecutionStatus::Completed,
            ..
        })
    ));
    let detail = harness.queue.get_detail(execution.id()).await?;
    ensure!(detail.execution.status() == ExecutionStatus::Cancelled);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_a_terminal_execution_writes_nothing(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("walmart grills", TargetSite::Walmart).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.cancel(execution.id()).await?;

    let result = harness.queue.cancel(execution.id()).await;

    ensure!(matches!(
        result,
        Err(TaskQueueError::InvalidStateTransition {
            from: ExecutionStatus::Cancelled,
            ..
        })
    ));
    ensure!(harness.queue.logs(execution.id()).await?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_an_unknown_execution_is_not_found(harness: QueueHarness) {
    let missing = ExecutionId::new();

    let result = harness.queue.cancel(missing).await;

    assert!(matches!(result, Err(TaskQueueError::ExecutionNotFound(id)) if id == missing));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_execution_frees_the_definition(harness: QueueHarness) -> eyre::Result<()> {
    let definition = harness.definition("shopify socks", TargetSite::Shopify).await?;
    let execution = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;
    harness.queue.cancel(execution.id()).await?;

    let next = harness
        .queue
        .enqueue(definition.id(), TriggerType::Manual)
        .await?;

    ensure!(next.status() == ExecutionStatus::Queued);
    Ok(())
}
