//! Fires scheduled definitions whose interval has elapsed.

use super::{TaskQueueError, TaskQueueResult, TaskQueueService};
use crate::definition::{domain::TaskDefinitionId, ports::TaskDefinitionRepository};
use crate::execution::{
    domain::{ExecutionFilter, PageRequest, SortOrder, TaskExecution, TriggerType},
    ports::{ExecutionLedger, LogSink, WorkerDispatcher},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one [`ScheduleDriver::tick`] did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Executions created on this tick.
    pub enqueued: Vec<TaskExecution>,
    /// Due definitions whose enqueue was refused, with the reason.
    pub skipped: Vec<(TaskDefinitionId, TaskQueueError)>,
}

/// Enqueues scheduled runs on behalf of enabled, scheduled definitions.
///
/// A definition is due when it has never run or its latest execution was
/// created at least one interval ago. Refused enqueues are reported and left
/// for a later tick; nothing is retried within a tick.
pub struct ScheduleDriver<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    definitions: Arc<R>,
    queue: Arc<TaskQueueService<R, L, S, D, C>>,
    clock: Arc<C>,
}

impl<R, L, S, D, C> ScheduleDriver<R, L, S, D, C>
where
    R: TaskDefinitionRepository,
    L: ExecutionLedger,
    S: LogSink,
    D: WorkerDispatcher,
    C: Clock + Send + Sync,
{
    /// Creates a driver over a definition repository and queue service.
    #[must_use]
    pub const fn new(
        definitions: Arc<R>,
        queue: Arc<TaskQueueService<R, L, S, D, C>>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            definitions,
            queue,
            clock,
        }
    }

    /// Enqueues every due definition once.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Internal`] when a store fails; refusals
    /// such as [`TaskQueueError::AlreadyRunning`] are reported in
    /// [`TickReport::skipped`] instead.
    pub async fn tick(&self) -> TaskQueueResult<TickReport> {
        let now = self.clock.utc();
        let mut report = TickReport::default();

        for definition in self.definitions.list_scheduled().await? {
            let Some(schedule) = definition.schedule() else {
                continue;
            };
            let definition_id = definition.id();
            let latest = self
                .queue
                .list(
                    ExecutionFilter::any().for_definition(definition_id),
                    SortOrder::NewestFirst,
                    Some(PageRequest::first(1)),
                )
                .await?;
            let due = latest
                .items
                .first()
                .is_none_or(|last| now - last.created_at() >= schedule.as_time_delta());
            if !due {
                continue;
            }

            match self.queue.enqueue(definition_id, TriggerType::Scheduled).await {
                Ok(execution) => {
                    debug!(%definition_id, execution_id = %execution.id(), "scheduled run enqueued");
                    report.enqueued.push(execution);
                }
                Err(err @ TaskQueueError::Internal(_)) => return Err(err),
                Err(err) => {
                    info!(%definition_id, reason = %err, "scheduled run skipped");
                    report.skipped.push((definition_id, err));
                }
            }
        }
        Ok(report)
    }

    /// Ticks every `interval` until `shutdown` fires.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "schedule driver starting");
        loop {
            match self.tick().await {
                Ok(report) if !report.enqueued.is_empty() => {
                    info!(
                        enqueued = report.enqueued.len(),
                        skipped = report.skipped.len(),
                        "schedule tick enqueued runs"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "schedule tick failed"),
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        info!("schedule driver stopped");
    }
}
