//! Adapter implementations for execution ports.

pub mod memory;
pub mod postgres;
pub mod process;
pub mod recording;
pub mod registry;

pub use process::{ProcessWorkerConfig, ProcessWorkerDispatcher};
pub use recording::RecordingDispatcher;
pub use registry::SiteDispatcherRegistry;
