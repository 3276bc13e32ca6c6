//! Services orchestrating the execution lifecycle.

mod cancellation;
mod queue;
mod scheduler;
mod watchdog;

pub use cancellation::CancellationRegistry;
pub use queue::{
    AppendLogRequest, ExecutionDetail, QueryLimits, TaskQueueError, TaskQueueResult,
    TaskQueueService,
};
pub use scheduler::{ScheduleDriver, TickReport};
pub use watchdog::{ExecutionWatchdog, WatchdogPolicy};
