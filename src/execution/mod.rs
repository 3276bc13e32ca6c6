//! Execution ledger, log ingestion and the task queue manager.
//!
//! This module owns every run attempt of a task definition: creating queued
//! executions under the single-flight guard, moving them through the
//! execution state machine, accepting worker log lines, and cancelling
//! in-flight runs. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - Worker-facing payloads in [`wire`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
pub mod wire;

#[cfg(test)]
mod tests;
