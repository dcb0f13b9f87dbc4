//! Application layer use cases for the security component service.
//!
//! Use cases in this layer orchestrate the trust core and depend only on
//! traits (`PermissionBookkeeper`, `ConfirmationDialog`, `AuditSink`,
//! `MonotonicClock`), so every collaborator can be swapped for a test double.
//!
//! # Sub-modules
//!
//! - **`manage_components`** – The registry of trust records: registration,
//!   descriptor updates, unregistration and owner process death.
//!
//! - **`report_click`** – Verifies a reported click and drives the
//!   confirmation dialog and the grant.  This is the security gate: nothing
//!   else in the service grants a permission.

pub mod manage_components;
pub mod report_click;
