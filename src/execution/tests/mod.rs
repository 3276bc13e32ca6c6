//! Unit tests for the execution module.
//!
//! Domain tests exercise the aggregate and its value types; service tests
//! drive the queue service over the in-memory store with a mocked
//! dispatcher.
