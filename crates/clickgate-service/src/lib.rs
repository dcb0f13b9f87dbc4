//! clickgate-service: the registry, click flow and enhance backends around
//! the `clickgate_core` trust core.
//!
//! Built as a library so the `tests/` suites drive the same module tree as
//! the `clickgate-service` binary.

pub mod application;
pub mod infrastructure;
