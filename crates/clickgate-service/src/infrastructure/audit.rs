//! Audit sink writing security events to the `security_audit` log target.
//!
//! Filter on it with `RUST_LOG=security_audit=warn` to get only the audit
//! trail.

use clickgate_core::trust::{AuditEvent, AuditSink};
use tracing::warn;

/// `tracing` target every audit event is emitted under.
pub const AUDIT_TARGET: &str = "security_audit";

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn report(&self, event: &AuditEvent) {
        warn!(
            target: AUDIT_TARGET,
            caller_uid = event.caller_uid,
            caller_pid = event.caller_pid,
            component_id = event.component_id,
            component_type = %event.component_type,
            "click without authenticity payload"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickgate_core::ComponentType;

    #[test]
    fn test_report_does_not_panic_without_subscriber() {
        TracingAuditSink.report(&AuditEvent {
            caller_uid: 1,
            caller_pid: 2,
            component_id: 3,
            component_type: ComponentType::Paste,
        });
    }
}
