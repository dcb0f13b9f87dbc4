//! Per-component trust: click validation, grant state and its lifecycle.

pub mod audit;
pub mod clock;
pub mod lifecycle;
pub mod record;

pub use audit::{AuditEvent, AuditSink, NullAuditSink};
pub use clock::{FixedClock, MonotonicClock, SystemMonotonicClock};
pub use lifecycle::{TrustEvent, TrustState};
pub use record::{
    PermissionBookkeeper, TrustRecord, VerifyContext, ACTIVATION_KEY_CODES, MAX_TOUCH_INTERVAL_US,
};
