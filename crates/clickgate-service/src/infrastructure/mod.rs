//! Infrastructure layer for the service.
//!
//! Concrete implementations of the collaborator traits the application layer
//! and the trust core consume: enhance backends, permission bookkeeping,
//! the headless dialog, the audit sink and config storage.  `service_state`
//! wires them together.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clickgate_core`, but MUST NOT be imported by the `application` layer.

pub mod audit;
pub mod backends;
pub mod dialog;
pub mod dump;
pub mod permissions;
pub mod service_state;
pub mod storage;
