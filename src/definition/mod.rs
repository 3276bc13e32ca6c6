//! Task definition store for Scrapeyard.
//!
//! Task definitions describe a scrape target, whether it may run, and how
//! often the schedule driver should trigger it. They are owned by the CRUD
//! layer; the queue manager only reads them to validate enqueue requests.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;
