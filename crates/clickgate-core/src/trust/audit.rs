//! Security audit events raised by the trust core.

use serde::Serialize;

use crate::domain::component::{ComponentId, ComponentType};

/// Raised when a click arrives without its authenticity payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub caller_uid: i32,
    pub caller_pid: i32,
    pub component_id: ComponentId,
    pub component_type: ComponentType,
}

/// Destination of audit events (the platform security-event log).
pub trait AuditSink: Send + Sync {
    fn report(&self, event: &AuditEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn report(&self, _event: &AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_uses_camel_case_field_names() {
        let event = AuditEvent {
            caller_uid: 20010,
            caller_pid: 4321,
            component_id: 7,
            component_type: ComponentType::Save,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"callerUid\":20010"));
        assert!(json.contains("\"callerPid\":4321"));
        assert!(json.contains("\"componentId\":7"));
        assert!(json.contains("\"componentType\":\"save\""));
    }
}
