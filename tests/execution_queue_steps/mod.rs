//! Step definitions for execution queue scenarios.
