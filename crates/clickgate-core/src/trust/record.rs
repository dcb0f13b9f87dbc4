//! `TrustRecord`: per-component click validation and grant state.
//!
//! # Validation pipeline (for beginners)
//!
//! [`TrustRecord::check_touch_info`] runs three checks, cheapest first, and
//! stops at the first failure:
//!
//! 1. **Recency** – the event timestamp must lie inside
//!    `[now - MAX_TOUCH_INTERVAL_US, now]`.  Stale events (replays) and
//!    events from the future (skewed or forged clocks) are both rejected.
//! 2. **Geometry** – a pointer event must land inside the component's
//!    last-known rectangle, boundary included.  A key event must be one of
//!    the activation keys (space, enter, numpad enter).
//! 3. **Authenticity** – the event's [`ExtraInfo`](crate::domain::click::ExtraInfo)
//!    must verify through the enhance adapter.  A missing payload is
//!    rejected up front and reported as a security audit event.
//!
//! Untrusted input is the expected adversarial case, so the check answers
//! with a `bool` and a log line rather than an error.
//!
//! # Concurrency
//!
//! A record takes no locks.  The owner serializes mutating calls per
//! component id; `check_touch_info` only reads the record.

use std::fmt::Write as _;

use tracing::{debug, info, warn};

use crate::domain::caller::CallerInfo;
use crate::domain::click::{ClickEvent, ClickKind};
use crate::domain::component::{ComponentDescriptor, ComponentId};
use crate::enhance::adapter::EnhanceAdapter;
use crate::error::SecCompError;
use crate::trust::audit::{AuditEvent, AuditSink};
use crate::trust::clock::MonotonicClock;

/// Maximum age of an accepted click, in microseconds (one second).
pub const MAX_TOUCH_INTERVAL_US: u64 = 1_000_000;

/// Key codes that activate a focused security component.
pub const ACTIVATION_KEY_CODES: [u32; 3] = [
    2050, // space
    2054, // enter
    2119, // numpad enter
];

/// Temporary-permission bookkeeping owned by the permission subsystem.
pub trait PermissionBookkeeper: Send + Sync {
    fn grant_temp_permission(
        &self,
        token_id: u32,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError>;

    fn revoke_temp_permission(
        &self,
        token_id: u32,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError>;
}

/// Collaborators consulted by [`TrustRecord::check_touch_info`].
#[derive(Clone, Copy)]
pub struct VerifyContext<'a> {
    pub adapter: &'a EnhanceAdapter,
    pub clock: &'a dyn MonotonicClock,
    pub audit: &'a dyn AuditSink,
}

/// Trust state of one registered security component.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustRecord {
    sc_id: ComponentId,
    caller: CallerInfo,
    descriptor: ComponentDescriptor,
    granted: bool,
}

impl TrustRecord {
    /// Creates an ungranted record.
    pub fn new(sc_id: ComponentId, caller: CallerInfo, descriptor: ComponentDescriptor) -> Self {
        Self {
            sc_id,
            caller,
            descriptor,
            granted: false,
        }
    }

    pub fn sc_id(&self) -> ComponentId {
        self.sc_id
    }

    pub fn caller(&self) -> &CallerInfo {
        &self.caller
    }

    pub fn token_id(&self) -> u32 {
        self.caller.token_id
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    // ── Grant / revoke ───────────────────────────────────────────────────────

    /// Marks the record granted and records the temporary permission.
    ///
    /// The flag is set before the bookkeeper runs, so a bookkeeping failure
    /// leaves the record granted.  Callers that need a consistent view must
    /// revoke on error.
    ///
    /// # Errors
    ///
    /// Whatever the bookkeeper returns, unchanged.
    pub fn grant(&mut self, bookkeeper: &dyn PermissionBookkeeper) -> Result<(), SecCompError> {
        self.granted = true;
        info!(
            sc_id = self.sc_id,
            token_id = self.caller.token_id,
            component_type = %self.descriptor.component_type,
            "granting temporary permission"
        );
        bookkeeper.grant_temp_permission(self.caller.token_id, &self.descriptor)
    }

    /// Clears the grant and revokes the temporary permission.
    ///
    /// Revoking an ungranted record succeeds without touching the bookkeeper.
    ///
    /// # Errors
    ///
    /// Whatever the bookkeeper returns, unchanged.
    pub fn revoke(&mut self, bookkeeper: &dyn PermissionBookkeeper) -> Result<(), SecCompError> {
        if !self.granted {
            debug!(sc_id = self.sc_id, "revoke on ungranted record ignored");
            return Ok(());
        }
        self.granted = false;
        info!(
            sc_id = self.sc_id,
            token_id = self.caller.token_id,
            component_type = %self.descriptor.component_type,
            "revoking temporary permission"
        );
        bookkeeper.revoke_temp_permission(self.caller.token_id, &self.descriptor)
    }

    // ── Click validation ─────────────────────────────────────────────────────

    /// Returns `true` only if `event` passes the recency, geometry and
    /// authenticity checks, in that order.
    pub fn check_touch_info(&self, event: &ClickEvent, ctx: &VerifyContext<'_>) -> bool {
        self.check_recency(event, ctx.clock)
            && self.check_geometry(event)
            && self.check_authenticity(event, ctx)
    }

    fn check_recency(&self, event: &ClickEvent, clock: &dyn MonotonicClock) -> bool {
        let now = clock.now_us();
        let earliest = now.saturating_sub(MAX_TOUCH_INTERVAL_US);
        let ts = event.timestamp_us();
        if ts < earliest {
            warn!(
                sc_id = self.sc_id,
                timestamp_us = ts,
                now_us = now,
                "click rejected: event is stale"
            );
            return false;
        }
        if ts > now {
            warn!(
                sc_id = self.sc_id,
                timestamp_us = ts,
                now_us = now,
                "click rejected: event is from the future"
            );
            return false;
        }
        true
    }

    fn check_geometry(&self, event: &ClickEvent) -> bool {
        match event.kind {
            ClickKind::Point {
                touch_x, touch_y, ..
            } => {
                let rect = &self.descriptor.rect;
                if rect.contains(touch_x, touch_y) {
                    return true;
                }
                warn!(
                    sc_id = self.sc_id,
                    touch_x,
                    touch_y,
                    rect_x = rect.x,
                    rect_y = rect.y,
                    rect_width = rect.width,
                    rect_height = rect.height,
                    "click rejected: point is outside the component"
                );
                false
            }
            ClickKind::Key { key_code, .. } => {
                if ACTIVATION_KEY_CODES.contains(&key_code) {
                    return true;
                }
                warn!(
                    sc_id = self.sc_id,
                    key_code, "click rejected: key does not activate components"
                );
                false
            }
        }
    }

    fn check_authenticity(&self, event: &ClickEvent, ctx: &VerifyContext<'_>) -> bool {
        if !event.extra_info.is_present() {
            ctx.audit.report(&AuditEvent {
                caller_uid: self.caller.uid,
                caller_pid: self.caller.pid,
                component_id: self.sc_id,
                component_type: self.descriptor.component_type,
            });
            warn!(
                sc_id = self.sc_id,
                code = SecCompError::ClickEventInvalid.code(),
                "click rejected: {}",
                SecCompError::ClickEventInvalid
            );
            return false;
        }
        match ctx.adapter.check_extra_info(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    sc_id = self.sc_id,
                    code = e.code(),
                    "click rejected: extra info did not verify: {e}"
                );
                false
            }
        }
    }

    // ── Descriptor ───────────────────────────────────────────────────────────

    /// `true` when `other` matches this record's identity fields.
    pub fn compare_basic_info(&self, other: &ComponentDescriptor) -> bool {
        let same = self.descriptor.basic_info_eq(other);
        if !same {
            debug!(sc_id = self.sc_id, "reported descriptor diverges from the one on file");
        }
        same
    }

    /// Replaces the descriptor on file.  Grant state is untouched; the owner
    /// revokes first when the update invalidates a grant.
    pub fn update_descriptor(&mut self, descriptor: ComponentDescriptor) {
        self.descriptor = descriptor;
    }

    /// Appends a one-line text description of this record to `out`.
    pub fn dump(&self, out: &mut String) {
        let rect = &self.descriptor.rect;
        let _ = writeln!(
            out,
            "scId: {}, type: {}, tokenId: {}, pid: {}, uid: {}, granted: {}, rect: ({}, {}, {}, {})",
            self.sc_id,
            self.descriptor.component_type,
            self.caller.token_id,
            self.caller.pid,
            self.caller.uid,
            self.granted,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::click::ExtraInfo;
    use crate::domain::component::{ComponentType, Rect};
    use crate::enhance::backend::ServiceEnhanceBackend;
    use crate::enhance::catalog::BackendCatalog;
    use crate::domain::raw_data::RawData;
    use crate::protocol::buffer::MessageBuffer;
    use crate::trust::clock::FixedClock;
    use mockall::mock;
    use std::sync::{Arc, Mutex};

    mock! {
        Bookkeeper {}
        impl PermissionBookkeeper for Bookkeeper {
            fn grant_temp_permission(
                &self,
                token_id: u32,
                descriptor: &ComponentDescriptor,
            ) -> Result<(), SecCompError>;
            fn revoke_temp_permission(
                &self,
                token_id: u32,
                descriptor: &ComponentDescriptor,
            ) -> Result<(), SecCompError>;
        }
    }

    #[derive(Default)]
    struct CollectingAudit {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for CollectingAudit {
        fn report(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    /// Service backend that accepts every signed click.
    struct AcceptAll;

    impl ServiceEnhanceBackend for AcceptAll {
        fn check_extra_info(&self, _: &ClickEvent) -> Result<(), SecCompError> {
            Ok(())
        }
        fn enable_input_enhance(&self) -> Result<(), SecCompError> {
            Ok(())
        }
        fn disable_input_enhance(&self) -> Result<(), SecCompError> {
            Ok(())
        }
        fn check_component_info(
            &self,
            _: i32,
            _: &ComponentDescriptor,
            _: &str,
        ) -> Result<(), SecCompError> {
            Ok(())
        }
        fn start_service(&self) {}
        fn exit_service(&self) {}
        fn notify_process_died(&self, _: i32) {}
        fn add_process(&self, _: i32) {}
        fn remove_process(&self, _: i32) {}
        fn serialize(&self, input: &MessageBuffer) -> Result<RawData, SecCompError> {
            RawData::from_bytes(input.as_bytes().to_vec())
        }
        fn deserialize(&self, input: &RawData) -> Result<MessageBuffer, SecCompError> {
            Ok(MessageBuffer::from_vec(input.as_bytes().to_vec()))
        }
    }

    const NOW: u64 = 50_000_000;

    fn record() -> TrustRecord {
        TrustRecord::new(
            7,
            CallerInfo::new(0xABCD, 20010, 4321),
            ComponentDescriptor::new(
                ComponentType::Location,
                Rect::new(0.0, 0.0, 100.0, 100.0),
                Rect::new(0.0, 0.0, 1080.0, 2340.0),
            ),
        )
    }

    fn accepting_adapter() -> EnhanceAdapter {
        EnhanceAdapter::new(BackendCatalog::new().with_service_backend(Arc::new(AcceptAll)))
    }

    fn signed_point(x: f64, y: f64, ts: u64) -> ClickEvent {
        ClickEvent::point(x, y, ts).with_extra_info(ExtraInfo::present(vec![0xAA; 32]).unwrap())
    }

    fn check(record: &TrustRecord, adapter: &EnhanceAdapter, event: &ClickEvent) -> bool {
        let clock = FixedClock(NOW);
        let audit = CollectingAudit::default();
        let ctx = VerifyContext {
            adapter,
            clock: &clock,
            audit: &audit,
        };
        record.check_touch_info(event, &ctx)
    }

    // ── Grant / revoke ───────────────────────────────────────────────────────

    #[test]
    fn test_grant_sets_flag_and_forwards_result() {
        // Arrange
        let mut bookkeeper = MockBookkeeper::new();
        bookkeeper
            .expect_grant_temp_permission()
            .withf(|token, _| *token == 0xABCD)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut rec = record();

        // Act
        let result = rec.grant(&bookkeeper);

        // Assert
        assert!(result.is_ok());
        assert!(rec.is_granted());
    }

    #[test]
    fn test_grant_failure_leaves_record_granted() {
        let mut bookkeeper = MockBookkeeper::new();
        bookkeeper
            .expect_grant_temp_permission()
            .returning(|_, _| Err(SecCompError::CallbackOperationFailed("store down".into())));
        let mut rec = record();

        let result = rec.grant(&bookkeeper);

        assert_eq!(
            result,
            Err(SecCompError::CallbackOperationFailed("store down".into()))
        );
        assert!(rec.is_granted());
    }

    #[test]
    fn test_revoke_twice_on_ungranted_record_never_calls_bookkeeper() {
        // Arrange
        let mut bookkeeper = MockBookkeeper::new();
        bookkeeper.expect_revoke_temp_permission().times(0);
        let mut rec = record();

        // Act + Assert
        assert!(rec.revoke(&bookkeeper).is_ok());
        assert!(rec.revoke(&bookkeeper).is_ok());
        assert!(!rec.is_granted());
    }

    #[test]
    fn test_revoke_after_grant_calls_bookkeeper_once() {
        let mut bookkeeper = MockBookkeeper::new();
        bookkeeper
            .expect_grant_temp_permission()
            .returning(|_, _| Ok(()));
        bookkeeper
            .expect_revoke_temp_permission()
            .times(1)
            .returning(|_, _| Ok(()));
        let mut rec = record();

        rec.grant(&bookkeeper).unwrap();
        rec.revoke(&bookkeeper).unwrap();
        rec.revoke(&bookkeeper).unwrap();

        assert!(!rec.is_granted());
    }

    // ── Recency ──────────────────────────────────────────────────────────────

    #[test]
    fn test_event_just_older_than_window_is_rejected() {
        let adapter = accepting_adapter();
        let event = signed_point(50.0, 50.0, NOW - MAX_TOUCH_INTERVAL_US - 1);
        assert!(!check(&record(), &adapter, &event));
    }

    #[test]
    fn test_event_at_window_edge_is_accepted() {
        let adapter = accepting_adapter();
        let event = signed_point(50.0, 50.0, NOW - MAX_TOUCH_INTERVAL_US);
        assert!(check(&record(), &adapter, &event));
    }

    #[test]
    fn test_event_at_current_time_is_accepted() {
        let adapter = accepting_adapter();
        assert!(check(&record(), &adapter, &signed_point(50.0, 50.0, NOW)));
    }

    #[test]
    fn test_event_from_the_future_is_rejected() {
        let adapter = accepting_adapter();
        assert!(!check(&record(), &adapter, &signed_point(50.0, 50.0, NOW + 1)));
    }

    // ── Geometry ─────────────────────────────────────────────────────────────

    #[test]
    fn test_point_on_boundary_is_accepted() {
        let adapter = accepting_adapter();
        assert!(check(&record(), &adapter, &signed_point(100.0, 100.0, NOW)));
        assert!(check(&record(), &adapter, &signed_point(0.0, 0.0, NOW)));
    }

    #[test]
    fn test_point_strictly_outside_is_rejected() {
        let adapter = accepting_adapter();
        assert!(!check(&record(), &adapter, &signed_point(100.5, 50.0, NOW)));
        assert!(!check(&record(), &adapter, &signed_point(50.0, -0.5, NOW)));
    }

    #[test]
    fn test_activation_keys_pass_geometry_and_others_do_not() {
        let adapter = accepting_adapter();
        let signed_key =
            |code| ClickEvent::key(code, NOW).with_extra_info(ExtraInfo::present(vec![1]).unwrap());
        for code in ACTIVATION_KEY_CODES {
            assert!(check(&record(), &adapter, &signed_key(code)), "key {code}");
        }
        assert!(!check(&record(), &adapter, &signed_key(2017)));
    }

    // ── Authenticity ─────────────────────────────────────────────────────────

    #[test]
    fn test_missing_extra_info_is_rejected_and_audited() {
        // Arrange
        let adapter = accepting_adapter();
        let clock = FixedClock(NOW);
        let audit = CollectingAudit::default();
        let ctx = VerifyContext {
            adapter: &adapter,
            clock: &clock,
            audit: &audit,
        };
        let event = ClickEvent::point(50.0, 50.0, NOW);

        // Act
        let accepted = record().check_touch_info(&event, &ctx);

        // Assert
        assert!(!accepted);
        let events = audit.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![AuditEvent {
                caller_uid: 20010,
                caller_pid: 4321,
                component_id: 7,
                component_type: ComponentType::Location,
            }]
        );
    }

    #[test]
    fn test_earlier_stage_failure_skips_audit() {
        let adapter = accepting_adapter();
        let clock = FixedClock(NOW);
        let audit = CollectingAudit::default();
        let ctx = VerifyContext {
            adapter: &adapter,
            clock: &clock,
            audit: &audit,
        };

        let accepted = record().check_touch_info(&ClickEvent::point(500.0, 50.0, NOW), &ctx);

        assert!(!accepted);
        assert!(audit.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_without_backend_signed_click_fails_closed() {
        let adapter = EnhanceAdapter::default();
        assert!(!check(&record(), &adapter, &signed_point(50.0, 50.0, NOW)));
    }

    // ── Descriptor ───────────────────────────────────────────────────────────

    #[test]
    fn test_compare_basic_info_detects_moved_component() {
        let rec = record();
        let mut moved = rec.descriptor().clone();
        assert!(rec.compare_basic_info(&moved));
        moved.rect = Rect::new(10.0, 0.0, 100.0, 100.0);
        assert!(!rec.compare_basic_info(&moved));
    }

    #[test]
    fn test_compare_basic_info_detects_metadata_change() {
        let rec = record();
        let mut other = rec.descriptor().clone();
        other.enhance_metadata = vec![1, 2, 3];
        assert!(!rec.compare_basic_info(&other));
    }

    #[test]
    fn test_update_descriptor_keeps_grant_state() {
        let mut bookkeeper = MockBookkeeper::new();
        bookkeeper
            .expect_grant_temp_permission()
            .returning(|_, _| Ok(()));
        let mut rec = record();
        rec.grant(&bookkeeper).unwrap();

        let mut moved = rec.descriptor().clone();
        moved.rect = Rect::new(5.0, 5.0, 10.0, 10.0);
        rec.update_descriptor(moved.clone());

        assert!(rec.is_granted());
        assert_eq!(rec.descriptor(), &moved);
    }

    #[test]
    fn test_dump_describes_record_on_one_line() {
        let mut out = String::new();
        record().dump(&mut out);
        assert_eq!(
            out,
            "scId: 7, type: location, tokenId: 43981, pid: 4321, uid: 20010, granted: false, rect: (0, 0, 100, 100)\n"
        );
    }
}
