//! Dispatcher that runs each execution in a child process.
//!
//! The child receives its identity through the `SCRAPEYARD_*` environment
//! variables and reports logs and status through the worker protocol. The
//! dispatcher only watches the process: it never changes execution status
//! itself, but can forward each exit to whoever owns the ledger.

use crate::execution::{
    domain::ExecutionId,
    ports::{DispatchError, DispatchResult, WorkerAssignment, WorkerDispatcher, WorkerExit},
    wire::WorkerEnvironment,
};
use camino::Utf8PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Launch settings for [`ProcessWorkerDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWorkerConfig {
    /// Worker executable.
    pub program: Utf8PathBuf,
    /// Arguments passed before any per-execution state.
    pub args: Vec<String>,
    /// How long a cancelled worker may keep running before it is killed.
    pub cancel_grace: Duration,
    /// Upper bound on concurrently running workers.
    pub max_concurrent: usize,
}

/// Launches one worker process per assignment.
#[derive(Debug, Clone)]
pub struct ProcessWorkerDispatcher {
    config: Arc<ProcessWorkerConfig>,
    slots: Arc<Semaphore>,
    exits: Option<UnboundedSender<WorkerExit>>,
}

impl ProcessWorkerDispatcher {
    /// Creates a dispatcher from launch settings.
    #[must_use]
    pub fn new(config: ProcessWorkerConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config: Arc::new(config),
            slots,
            exits: None,
        }
    }

    /// Sends a [`WorkerExit`] for every worker process that ends.
    ///
    /// Pair with `TaskQueueService::watch_worker_exits` so a worker that dies
    /// without reporting cannot hold its definition's slot.
    #[must_use]
    pub fn with_exit_reports(mut self, exits: UnboundedSender<WorkerExit>) -> Self {
        self.exits = Some(exits);
        self
    }

    /// Returns the number of free worker slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    fn command_for(&self, assignment: &WorkerAssignment) -> Command {
        let mut command = Command::new(self.config.program.as_std_path());
        command
            .args(&self.config.args)
            .envs(WorkerEnvironment::from_assignment(assignment).vars())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

impl WorkerDispatcher for ProcessWorkerDispatcher {
    fn dispatch(&self, assignment: WorkerAssignment) -> DispatchResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(DispatchError::launch)?;
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| DispatchError::NoCapacity)?;

        let child = self
            .command_for(&assignment)
            .spawn()
            .map_err(DispatchError::launch)?;
        info!(
            execution_id = %assignment.execution_id,
            target_site = %assignment.target_site,
            pid = child.id(),
            "worker process launched"
        );

        let watch = WorkerWatch {
            child,
            execution_id: assignment.execution_id,
            cancellation: assignment.cancellation,
            cancel_grace: self.config.cancel_grace,
            permit,
            exits: self.exits.clone(),
        };
        runtime.spawn(watch.run());
        Ok(())
    }
}

/// Watches one worker process until it exits.
struct WorkerWatch {
    child: Child,
    execution_id: ExecutionId,
    cancellation: CancellationToken,
    cancel_grace: Duration,
    permit: OwnedSemaphorePermit,
    exits: Option<UnboundedSender<WorkerExit>>,
}

impl WorkerWatch {
    async fn run(mut self) {
        let execution_id = self.execution_id;
        let exit = tokio::select! {
            status = self.child.wait() => status,
            () = self.cancellation.cancelled() => {
                info!(
                    %execution_id,
                    grace_secs = self.cancel_grace.as_secs(),
                    "cancellation signalled to worker"
                );
                match tokio::time::timeout(self.cancel_grace, self.child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(%execution_id, "worker ignored cancellation; killing process");
                        if let Err(err) = self.child.kill().await {
                            warn!(%execution_id, error = %err, "failed to kill worker process");
                        }
                        self.child.wait().await
                    }
                }
            }
        };

        let description = match exit {
            Ok(status) if status.success() => {
                info!(%execution_id, "worker process exited");
                status.to_string()
            }
            Ok(status) => {
                warn!(%execution_id, %status, "worker process exited unsuccessfully");
                status.to_string()
            }
            Err(err) => {
                warn!(%execution_id, error = %err, "failed to wait for worker process");
                format!("wait failed: {err}")
            }
        };
        drop(self.permit);

        if let Some(exits) = self.exits
            && exits
                .send(WorkerExit {
                    execution_id,
                    description,
                })
                .is_err()
        {
            debug!(%execution_id, "worker exit receiver closed");
        }
    }
}
