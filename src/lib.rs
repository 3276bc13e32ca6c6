//! Scrapeyard: task queue and execution state machine for scrape workers.
//!
//! This crate records scraping task definitions, queues executions of them,
//! hands each execution to a worker and tracks it through its lifecycle
//! while collecting the worker's log output.
//!
//! # Architecture
//!
//! Scrapeyard follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, processes)
//! - **Services**: Orchestration over ports
//!
//! # Modules
//!
//! - [`definition`]: Scraping task definitions and their repository
//! - [`execution`]: Execution lifecycle, logs, dispatch, watchdog and
//!   scheduling
//! - [`config`]: TOML configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod definition;
pub mod execution;
pub mod telemetry;
