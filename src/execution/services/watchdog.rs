//! Timeout backstop for executions whose worker never reports back.
//!
//! Cancellation and failure reporting are cooperative, so a crashed worker
//! would otherwise hold its definition's single-flight slot forever. The
//! watchdog periodically force-fails executions that have been running (and,
//! optionally, queued) for longer than the configured thresholds.

use super::{TaskQueueError, TaskQueueResult, TaskQueueService};
use crate::definition::ports::TaskDefinitionRepository;
use crate::execution::{
    domain::TaskExecution,
    ports::{ExecutionLedger, LogSink, WorkerDispatcher},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Thresholds and cadence for the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogPolicy {
    /// Running executions older than this are failed.
    pub running_timeout: Duration,
    /// Queued executions older than this are failed; `None` leaves queued
    /// executions alone.
    pub queued_timeout: Option<Duration>,
    /// Delay between sweeps in [`ExecutionWatchdog::run`].
    pub sweep_interval: Duration,
}

/// Periodically fails stale executions through the queue service.
pub struct ExecutionWatchdog<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    queue: Arc<TaskQueueService<R, L, S, D, C>>,
    clock: Arc<C>,
    policy: WatchdogPolicy,
}

impl<R, L, S, D, C> ExecutionWatchdog<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates a watchdog over a queue service.
    #[must_use]
    pub const fn new(
        queue: Arc<TaskQueueService<R, L, S, D, C>>,
        clock: Arc<C>,
        policy: WatchdogPolicy,
    ) -> Self {
        Self {
            queue,
            clock,
            policy,
        }
    }

    /// Runs one sweep and returns the executions it failed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Internal`] when the ledger fails or a
    /// threshold does not fit a timestamp offset.
    pub async fn sweep_once(&self) -> TaskQueueResult<Vec<TaskExecution>> {
        let now = self.clock.utc();
        let running_before = cutoff(now, self.policy.running_timeout)?;
        let queued_before = self
            .policy
            .queued_timeout
            .map(|timeout| cutoff(now, timeout))
            .transpose()?;

        let expired = self.queue.expire_stale(running_before, queued_before).await?;
        if expired.is_empty() {
            debug!("watchdog sweep found no stale executions");
        } else {
            info!(count = expired.len(), "watchdog failed stale executions");
        }
        Ok(expired)
    }

    /// Sweeps every `sweep_interval` until `shutdown` fires.
    ///
    /// Sweep errors are logged and the loop carries on.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            running_timeout_secs = self.policy.running_timeout.as_secs(),
            queued_timeout_secs = self.policy.queued_timeout.map(|timeout| timeout.as_secs()),
            sweep_interval_secs = self.policy.sweep_interval.as_secs(),
            "execution watchdog starting"
        );
        loop {
            if let Err(err) = self.sweep_once().await {
                warn!(error = %err, "watchdog sweep failed");
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.policy.sweep_interval) => {}
            }
        }
        info!("execution watchdog stopped");
    }
}

fn cutoff(now: DateTime<Utc>, timeout: Duration) -> TaskQueueResult<DateTime<Utc>> {
    let offset = TimeDelta::from_std(timeout).map_err(TaskQueueError::internal)?;
    now.checked_sub_signed(offset).ok_or_else(|| {
        TaskQueueError::internal(std::io::Error::other(format!(
            "timeout of {}s reaches before the earliest timestamp",
            timeout.as_secs()
        )))
    })
}
