//! Integration tests for the click trust pipeline.
//!
//! These tests drive the public API the way the service does: a click is
//! decoded from the wire, checked against a trust record through an
//! adapter built from a catalog, and the record's grant state is updated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use clickgate_core::domain::raw_data::RawData;
use clickgate_core::enhance::{
    BackendCatalog, BackendRole, EnhanceAdapter, LoadError, ServiceEnhanceBackend, SlotStatus,
    SERVICE_MODULE,
};
use clickgate_core::protocol::{decode_click_event, encode_click_event, signing_bytes, MessageBuffer};
use clickgate_core::trust::{
    AuditEvent, AuditSink, FixedClock, PermissionBookkeeper, TrustEvent, TrustRecord, TrustState,
    VerifyContext, MAX_TOUCH_INTERVAL_US,
};
use clickgate_core::{
    CallerInfo, ClickEvent, ComponentDescriptor, ComponentType, ExtraInfo, Rect, SecCompError,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

const NOW: u64 = 90_000_000;

/// Service backend that accepts a click when its payload equals the XOR of
/// its canonical bytes with a fixed key byte.
struct XorSigner {
    key: u8,
    verified: AtomicUsize,
}

impl XorSigner {
    fn new(key: u8) -> Self {
        Self {
            key,
            verified: AtomicUsize::new(0),
        }
    }

    fn sign(&self, event: &ClickEvent) -> ExtraInfo {
        ExtraInfo::present(signing_bytes(event).iter().map(|b| b ^ self.key).collect()).unwrap()
    }
}

impl ServiceEnhanceBackend for XorSigner {
    fn check_extra_info(&self, event: &ClickEvent) -> Result<(), SecCompError> {
        self.verified.fetch_add(1, Ordering::SeqCst);
        let expected: Vec<u8> = signing_bytes(event).iter().map(|b| b ^ self.key).collect();
        if event.extra_info.bytes() == expected.as_slice() {
            Ok(())
        } else {
            Err(SecCompError::ClickEventInvalid)
        }
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

#[derive(Default)]
struct LedgerBookkeeper {
    grants: Mutex<Vec<u32>>,
    revokes: Mutex<Vec<u32>>,
}

impl PermissionBookkeeper for LedgerBookkeeper {
    fn grant_temp_permission(
        &self,
        token_id: u32,
        _descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError> {
        self.grants.lock().unwrap().push(token_id);
        Ok(())
    }

    fn revoke_temp_permission(
        &self,
        token_id: u32,
        _descriptor: &ComponentDescriptor,
    ) -> Result<(), SecCompError> {
        self.revokes.lock().unwrap().push(token_id);
        Ok(())
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

fn location_button() -> TrustRecord {
    TrustRecord::new(
        1,
        CallerInfo::new(555, 20020, 3100),
        ComponentDescriptor::new(
            ComponentType::Location,
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(0.0, 0.0, 1080.0, 2340.0),
        ),
    )
}

// ── Fail-closed defaults ──────────────────────────────────────────────────────

#[test]
fn test_valid_click_without_backend_fails_closed() {
    // Arrange
    let adapter = EnhanceAdapter::new(BackendCatalog::new());
    let clock = FixedClock(NOW);
    let audit = CollectingAudit::default();
    let ctx = VerifyContext {
        adapter: &adapter,
        clock: &clock,
        audit: &audit,
    };
    let event =
        ClickEvent::point(50.0, 50.0, NOW).with_extra_info(ExtraInfo::present(vec![7; 16]).unwrap());

    // Act
    let authenticity = adapter.check_extra_info(&event);
    let accepted = location_button().check_touch_info(&event, &ctx);

    // Assert
    assert_eq!(authenticity, Err(SecCompError::EnhanceUnavailable));
    assert!(!accepted);
    assert!(audit.events.lock().unwrap().is_empty());
}

#[test]
fn test_fallback_buffers_round_trip_for_all_lengths() {
    let adapter = EnhanceAdapter::default();
    for len in [0usize, 1, 2, 17, 255, 4096] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
        let buffer = MessageBuffer::from_vec(payload.clone());
        let raw = adapter.service_serialize(&buffer).unwrap();
        assert_eq!(adapter.service_deserialize(&raw).unwrap().into_vec(), payload);
    }
}

// ── Signed clicks ─────────────────────────────────────────────────────────────

#[test]
fn test_signed_click_from_the_wire_is_accepted_and_granted() {
    // Arrange
    let signer = Arc::new(XorSigner::new(0x5C));
    let adapter =
        EnhanceAdapter::new(BackendCatalog::new().with_service_backend(signer.clone()));
    let clock = FixedClock(NOW);
    let audit = CollectingAudit::default();
    let ctx = VerifyContext {
        adapter: &adapter,
        clock: &clock,
        audit: &audit,
    };
    let bookkeeper = LedgerBookkeeper::default();
    let mut record = location_button();
    let unsigned = ClickEvent::point(50.0, 50.0, NOW - 250_000);
    let signed = unsigned.clone().with_extra_info(signer.sign(&unsigned));
    let wire = encode_click_event(&signed).unwrap();

    // Act
    let event = decode_click_event(&wire).unwrap();
    let accepted = record.check_touch_info(&event, &ctx);
    let state = TrustState::Registered
        .apply(record.sc_id(), TrustEvent::ClickVerified { needs_confirmation: false })
        .unwrap();
    record.grant(&bookkeeper).unwrap();

    // Assert
    assert!(accepted);
    assert_eq!(state, TrustState::Granted);
    assert!(record.is_granted());
    assert_eq!(*bookkeeper.grants.lock().unwrap(), vec![555]);
    assert_eq!(signer.verified.load(Ordering::SeqCst), 1);
}

#[test]
fn test_tampered_coordinates_fail_authenticity() {
    let signer = Arc::new(XorSigner::new(0x5C));
    let adapter =
        EnhanceAdapter::new(BackendCatalog::new().with_service_backend(signer.clone()));
    let clock = FixedClock(NOW);
    let audit = CollectingAudit::default();
    let ctx = VerifyContext {
        adapter: &adapter,
        clock: &clock,
        audit: &audit,
    };
    let original = ClickEvent::point(50.0, 50.0, NOW);
    let forged = ClickEvent::point(60.0, 50.0, NOW).with_extra_info(signer.sign(&original));

    assert!(!location_button().check_touch_info(&forged, &ctx));
}

#[test]
fn test_recency_window_boundaries() {
    let signer = Arc::new(XorSigner::new(1));
    let adapter =
        EnhanceAdapter::new(BackendCatalog::new().with_service_backend(signer.clone()));
    let clock = FixedClock(NOW);
    let audit = CollectingAudit::default();
    let ctx = VerifyContext {
        adapter: &adapter,
        clock: &clock,
        audit: &audit,
    };
    let at = |ts: u64| {
        let e = ClickEvent::point(50.0, 50.0, ts);
        let sig = signer.sign(&e);
        e.with_extra_info(sig)
    };
    let record = location_button();

    assert!(!record.check_touch_info(&at(NOW - MAX_TOUCH_INTERVAL_US - 1), &ctx));
    assert!(record.check_touch_info(&at(NOW), &ctx));
}

#[test]
fn test_unsigned_click_is_audited_and_never_reaches_backend() {
    // Arrange
    let signer = Arc::new(XorSigner::new(9));
    let adapter =
        EnhanceAdapter::new(BackendCatalog::new().with_service_backend(signer.clone()));
    let clock = FixedClock(NOW);
    let audit = CollectingAudit::default();
    let ctx = VerifyContext {
        adapter: &adapter,
        clock: &clock,
        audit: &audit,
    };

    // Act
    let accepted = location_button().check_touch_info(&ClickEvent::point(1.0, 1.0, NOW), &ctx);

    // Assert
    assert!(!accepted);
    assert_eq!(signer.verified.load(Ordering::SeqCst), 0);
    let events = audit.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].caller_uid, 20020);
    assert_eq!(events[0].caller_pid, 3100);
    assert_eq!(events[0].component_id, 1);
    assert_eq!(events[0].component_type, ComponentType::Location);
}

// ── Grant state ───────────────────────────────────────────────────────────────

#[test]
fn test_revoke_twice_on_never_granted_record_is_silent() {
    let bookkeeper = LedgerBookkeeper::default();
    let mut record = location_button();

    assert!(record.revoke(&bookkeeper).is_ok());
    assert!(record.revoke(&bookkeeper).is_ok());
    assert!(bookkeeper.revokes.lock().unwrap().is_empty());
}

// ── Backend initialisation ────────────────────────────────────────────────────

#[test]
fn test_concurrent_first_use_loads_backend_once() {
    // Arrange
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let mut catalog = BackendCatalog::new();
    catalog.register_service(SERVICE_MODULE, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LoadError::Failed {
            module: SERVICE_MODULE.to_string(),
            reason: "device key missing".to_string(),
        })
    });
    let adapter = Arc::new(EnhanceAdapter::new(catalog));
    let n = 8;
    let barrier = Arc::new(Barrier::new(n));
    let event = ClickEvent::point(1.0, 1.0, 1).with_extra_info(ExtraInfo::present(vec![1]).unwrap());

    // Act
    let results: Vec<Result<(), SecCompError>> = (0..n)
        .map(|_| {
            let adapter = Arc::clone(&adapter);
            let barrier = Arc::clone(&barrier);
            let event = event.clone();
            thread::spawn(move || {
                barrier.wait();
                adapter.check_extra_info(&event)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .collect();

    // Assert
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(results
        .iter()
        .all(|r| *r == Err(SecCompError::EnhanceUnavailable)));
    assert_eq!(
        adapter.slot_status(BackendRole::Service),
        SlotStatus::Unavailable
    );
}
