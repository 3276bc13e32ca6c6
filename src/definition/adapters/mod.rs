//! Adapter implementations for the task definition store.

pub mod memory;
pub mod postgres;
