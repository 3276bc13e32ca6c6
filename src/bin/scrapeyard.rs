//! Runs the scrapeyard queue manager.
//!
//! Usage:
//!
//! ```text
//! scrapeyard [config-path]
//! ```
//!
//! Without a path the built-in defaults apply. `DATABASE_URL` names the
//! `PostgreSQL` database holding definitions, executions and logs; its schema
//! is created by the migrations under `migrations/`.
//!
//! The process launches workers as child processes, fails executions whose
//! worker exits without reporting, sweeps stale executions and fires
//! scheduled definitions until it receives Ctrl-C.

use camino::Utf8PathBuf;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use mockable::DefaultClock;
use scrapeyard::{
    config::{ConfigError, ScrapeyardConfig},
    definition::adapters::postgres::PostgresTaskDefinitionRepository,
    execution::{
        adapters::{ProcessWorkerDispatcher, postgres::PostgresExecutionStore},
        services::{ExecutionWatchdog, ScheduleDriver, TaskQueueService},
    },
    telemetry::{TelemetryError, init_tracing},
};
use std::env;
use std::ffi::OsString;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DATABASE_URL_ENV: &str = "DATABASE_URL";

type ManagerPool = Pool<ConnectionManager<PgConnection>>;

/// Errors that stop the manager from starting or shutting down cleanly.
#[derive(Debug, Error)]
enum ManagerError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("{DATABASE_URL_ENV} is not set")]
    MissingDatabaseUrl,
    #[error("failed to connect to the database: {0}")]
    Pool(#[from] PoolError),
    #[error("runtime init failed: {0}")]
    RuntimeInit(#[source] std::io::Error),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

fn main() -> Result<(), ManagerError> {
    let (config, source) = load_config(env::args_os().skip(1))?;
    init_tracing(&config.telemetry)?;
    info!(config = %source, "configuration loaded");

    let url = env::var(DATABASE_URL_ENV).map_err(|_| ManagerError::MissingDatabaseUrl)?;
    let pool = Pool::builder().build(ConnectionManager::<PgConnection>::new(url))?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ManagerError::RuntimeInit)?;
    runtime.block_on(serve(&config, pool))
}

fn load_config(
    mut args: impl Iterator<Item = OsString>,
) -> Result<(ScrapeyardConfig, String), ManagerError> {
    let Some(first) = args.next() else {
        return Ok((ScrapeyardConfig::default(), "built-in defaults".to_owned()));
    };
    if let Some(extra) = args.next() {
        return Err(ManagerError::InvalidArgs(format!(
            "unexpected extra argument: {}",
            extra.to_string_lossy()
        )));
    }
    let path = first
        .into_string()
        .map(Utf8PathBuf::from)
        .map_err(|_| ManagerError::InvalidArgs("config path is not valid UTF-8".to_owned()))?;
    let config = ScrapeyardConfig::load(&path)?;
    Ok((config, path.into_string()))
}

async fn serve(config: &ScrapeyardConfig, pool: ManagerPool) -> Result<(), ManagerError> {
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();
    let dispatcher = ProcessWorkerDispatcher::new(config.process_worker()).with_exit_reports(exit_tx);
    let clock = Arc::new(DefaultClock);
    let definitions = Arc::new(PostgresTaskDefinitionRepository::new(pool.clone()));
    let store = Arc::new(PostgresExecutionStore::new(pool));
    let queue = Arc::new(
        TaskQueueService::new(
            Arc::clone(&definitions),
            Arc::clone(&store),
            store,
            Arc::new(dispatcher),
            Arc::clone(&clock),
        )
        .with_limits(config.query_limits()),
    );
    let watchdog = ExecutionWatchdog::new(
        Arc::clone(&queue),
        Arc::clone(&clock),
        config.watchdog_policy(),
    );
    let scheduler = ScheduleDriver::new(definitions, Arc::clone(&queue), clock);
    let tick = config.schedule_tick();

    let shutdown = CancellationToken::new();
    let background = [
        tokio::spawn({
            let stop = shutdown.clone();
            async move { watchdog.run(stop).await }
        }),
        tokio::spawn({
            let stop = shutdown.clone();
            async move { scheduler.run(tick, stop).await }
        }),
        tokio::spawn({
            let stop = shutdown.clone();
            async move { queue.watch_worker_exits(exit_rx, stop).await }
        }),
    ];
    info!(worker = %config.worker.program, "scrapeyard manager running");

    let signal = tokio::signal::ctrl_c().await;
    info!("shutting down");
    shutdown.cancel();
    for task in background {
        if let Err(err) = task.await {
            warn!(error = %err, "background task ended abnormally");
        }
    }
    signal.map_err(ManagerError::Signal)
}
