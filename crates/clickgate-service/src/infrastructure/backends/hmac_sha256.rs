//! HMAC-SHA256 enhance backends.
//!
//! All three roles share one symmetric key taken from the configuration:
//!
//! - the **input** backend signs the canonical bytes of a pointer event;
//! - the **service** backend verifies that signature on every click, checks
//!   component attestations, and tags IPC payloads with a trailing MAC;
//! - the **client** backend attests component descriptors before they are
//!   registered and tags/untags IPC payloads the same way.
//!
//! A descriptor attestation is the MAC over the descriptor's type and both
//! rectangles, stored in `enhance_metadata`.  Descriptors without metadata
//! are accepted; a present attestation must verify.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use clickgate_core::enhance::{ClientEnhanceBackend, InputEnhanceBackend, ServiceEnhanceBackend};
use clickgate_core::protocol::{signing_bytes, MessageBuffer};
use clickgate_core::{
    CallsiteToken, ClickEvent, ComponentDescriptor, ComponentId, ComponentType, RawData,
    SecCompError,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes.
pub const TAG_LEN: usize = 32;

/// Backend status code: a signature or tag did not verify.
pub const ERR_SIGNATURE_MISMATCH: i32 = -1001;
/// Backend status code: the key could not be used.
pub const ERR_BAD_KEY: i32 = -1002;

// ── Primitives ────────────────────────────────────────────────────────────────

fn keyed_mac(key: &[u8]) -> Result<HmacSha256, SecCompError> {
    HmacSha256::new_from_slice(key).map_err(|e| SecCompError::Backend {
        code: ERR_BAD_KEY,
        reason: format!("invalid hmac key: {e}"),
    })
}

/// Computes the HMAC-SHA256 tag of `message`.
///
/// # Errors
///
/// Returns a backend error with [`ERR_BAD_KEY`] if `key` is rejected.
pub fn sign(key: &[u8], message: &[u8]) -> Result<Vec<u8>, SecCompError> {
    let mut mac = keyed_mac(key)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verifies `tag` over `message` in constant time.
///
/// # Errors
///
/// Returns a backend error with [`ERR_SIGNATURE_MISMATCH`] if the tag does
/// not match.
pub fn verify(key: &[u8], message: &[u8], tag: &[u8]) -> Result<(), SecCompError> {
    let mut mac = keyed_mac(key)?;
    mac.update(message);
    mac.verify_slice(tag).map_err(|_| SecCompError::Backend {
        code: ERR_SIGNATURE_MISMATCH,
        reason: "hmac tag mismatch".to_string(),
    })
}

/// Canonical bytes of a descriptor's attested fields: the type tag followed
/// by both rectangles as big-endian `f64`s.
pub fn descriptor_signing_bytes(descriptor: &ComponentDescriptor) -> Vec<u8> {
    let type_tag: u8 = match descriptor.component_type {
        ComponentType::Location => 1,
        ComponentType::Paste => 2,
        ComponentType::Save => 3,
    };
    let mut buf = Vec::with_capacity(1 + 8 * 8);
    buf.push(type_tag);
    for rect in [&descriptor.rect, &descriptor.window_rect] {
        for v in [rect.x, rect.y, rect.width, rect.height] {
            buf.extend_from_slice(&v.to_be_bytes());
        }
    }
    buf
}

fn append_tag(key: &[u8], input: &MessageBuffer) -> Result<RawData, SecCompError> {
    let tag = sign(key, input.as_bytes())?;
    let mut bytes = Vec::with_capacity(input.len() + TAG_LEN);
    bytes.extend_from_slice(input.as_bytes());
    bytes.extend_from_slice(&tag);
    RawData::from_bytes(bytes)
}

fn strip_tag(key: &[u8], input: &RawData) -> Result<MessageBuffer, SecCompError> {
    if input.is_null() {
        return Err(SecCompError::InvalidValue(
            "raw data has no backing buffer".to_string(),
        ));
    }
    input.validate()?;
    let bytes = input.as_bytes();
    if bytes.len() < TAG_LEN {
        return Err(SecCompError::Backend {
            code: ERR_SIGNATURE_MISMATCH,
            reason: format!("payload of {} bytes is shorter than its tag", bytes.len()),
        });
    }
    let (payload, tag) = bytes.split_at(bytes.len() - TAG_LEN);
    verify(key, payload, tag)?;
    Ok(MessageBuffer::from_vec(payload.to_vec()))
}

fn read_key(key: &RwLock<Vec<u8>>) -> Vec<u8> {
    key.read().unwrap_or_else(PoisonError::into_inner).clone()
}

// ── Input role ────────────────────────────────────────────────────────────────

/// Signs pointer events on behalf of the input stack.
pub struct HmacInputBackend {
    key: RwLock<Vec<u8>>,
}

impl HmacInputBackend {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key: RwLock::new(key),
        }
    }
}

impl InputEnhanceBackend for HmacInputBackend {
    /// Replaces the signing key.
    fn set_config(&self, config: &[u8]) -> Result<(), SecCompError> {
        if config.is_empty() {
            return Err(SecCompError::InvalidValue("empty hmac key".to_string()));
        }
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = config.to_vec();
        info!("input backend key rotated");
        Ok(())
    }

    /// `event_data` is the event's canonical signing bytes.
    fn get_pointer_event_data(&self, event_data: &[u8]) -> Result<Vec<u8>, SecCompError> {
        if event_data.is_empty() {
            return Err(SecCompError::InvalidValue("empty pointer event".to_string()));
        }
        sign(&read_key(&self.key), event_data)
    }
}

// ── Service role ──────────────────────────────────────────────────────────────

/// Verifies click signatures and component attestations inside the service.
pub struct HmacServiceBackend {
    key: RwLock<Vec<u8>>,
    input_enhance: AtomicBool,
    running: AtomicBool,
    processes: Mutex<HashSet<i32>>,
}

impl HmacServiceBackend {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key: RwLock::new(key),
            input_enhance: AtomicBool::new(true),
            running: AtomicBool::new(false),
            processes: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_input_enhance_enabled(&self) -> bool {
        self.input_enhance.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn tracks_process(&self, pid: i32) -> bool {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&pid)
    }
}

impl ServiceEnhanceBackend for HmacServiceBackend {
    fn check_extra_info(&self, event: &ClickEvent) -> Result<(), SecCompError> {
        if !self.is_input_enhance_enabled() {
            warn!("input enhance disabled, refusing to vouch for click");
            return Err(SecCompError::Backend {
                code: ERR_SIGNATURE_MISMATCH,
                reason: "input enhance is disabled".to_string(),
            });
        }
        let result = verify(
            &read_key(&self.key),
            &signing_bytes(event),
            event.extra_info.bytes(),
        );
        if result.is_err() {
            warn!(
                size = event.extra_info.size,
                "click signature did not verify"
            );
        }
        result
    }

    fn enable_input_enhance(&self) -> Result<(), SecCompError> {
        self.input_enhance.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable_input_enhance(&self) -> Result<(), SecCompError> {
        self.input_enhance.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn check_component_info(
        &self,
        pid: i32,
        descriptor: &ComponentDescriptor,
        _raw_json: &str,
    ) -> Result<(), SecCompError> {
        if descriptor.enhance_metadata.is_empty() {
            debug!(pid, "component carries no attestation");
            return Ok(());
        }
        verify(
            &read_key(&self.key),
            &descriptor_signing_bytes(descriptor),
            &descriptor.enhance_metadata,
        )
        .map_err(|e| {
            warn!(pid, "component attestation did not verify");
            e
        })
    }

    fn start_service(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("hmac service backend started");
    }

    fn exit_service(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("hmac service backend stopped");
    }

    fn notify_process_died(&self, pid: i32) {
        self.remove_process(pid);
    }

    fn add_process(&self, pid: i32) {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid);
    }

    fn remove_process(&self, pid: i32) {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
    }

    fn serialize(&self, input: &MessageBuffer) -> Result<RawData, SecCompError> {
        append_tag(&read_key(&self.key), input)
    }

    fn deserialize(&self, input: &RawData) -> Result<MessageBuffer, SecCompError> {
        strip_tag(&read_key(&self.key), input)
    }
}

// ── Client role ───────────────────────────────────────────────────────────────

/// Attests component descriptors inside the application process.
pub struct HmacClientBackend {
    key: Vec<u8>,
    components: Mutex<HashMap<ComponentId, CallsiteToken>>,
}

impl HmacClientBackend {
    pub fn new(key: Vec<u8>) -> Self {
        Self {
            key,
            components: Mutex::new(HashMap::new()),
        }
    }

    /// Live component ids registered from `callsite`, ascending.
    pub fn components_at(&self, callsite: CallsiteToken) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self
            .components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, c)| **c == callsite)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_registered(&self, sc_id: ComponentId) -> bool {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&sc_id)
    }
}

impl ClientEnhanceBackend for HmacClientBackend {
    fn preprocess_component_info(
        &self,
        callsite: CallsiteToken,
        component_info: &mut String,
    ) -> Result<(), SecCompError> {
        let mut descriptor = ComponentDescriptor::from_json(component_info)?;
        descriptor.enhance_metadata = sign(&self.key, &descriptor_signing_bytes(&descriptor))?;
        *component_info = descriptor.to_json()?;
        debug!(%callsite, "component descriptor attested");
        Ok(())
    }

    fn register_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sc_id, callsite);
        Ok(())
    }

    fn unregister_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        let removed = self
            .components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&sc_id);
        match removed {
            Some(registered_at) if registered_at != callsite => {
                warn!(
                    sc_id,
                    %callsite,
                    %registered_at,
                    "component unregistered from another callsite"
                );
            }
            None => debug!(sc_id, "unregistering unknown component"),
            Some(_) => {}
        }
        Ok(())
    }

    fn serialize(
        &self,
        _callsite: CallsiteToken,
        input: &MessageBuffer,
    ) -> Result<RawData, SecCompError> {
        append_tag(&self.key, input)
    }

    fn deserialize(
        &self,
        _callsite: CallsiteToken,
        input: &RawData,
    ) -> Result<MessageBuffer, SecCompError> {
        strip_tag(&self.key, input)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clickgate_core::{ExtraInfo, Rect};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::new(
            ComponentType::Location,
            Rect::new(10.0, 10.0, 80.0, 30.0),
            Rect::new(0.0, 0.0, 1080.0, 2340.0),
        )
    }

    fn signed(event: ClickEvent) -> ClickEvent {
        let input = HmacInputBackend::new(KEY.to_vec());
        let tag = input.get_pointer_event_data(&signing_bytes(&event)).unwrap();
        event.with_extra_info(ExtraInfo::present(tag).unwrap())
    }

    // ── Signatures ───────────────────────────────────────────────────────────

    #[test]
    fn test_input_signature_verifies_in_service() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        let event = signed(ClickEvent::point(20.0, 20.0, 1_000));
        assert!(service.check_extra_info(&event).is_ok());
    }

    #[test]
    fn test_signature_over_other_coordinates_is_rejected() {
        // Arrange
        let service = HmacServiceBackend::new(KEY.to_vec());
        let genuine = signed(ClickEvent::point(20.0, 20.0, 1_000));
        let forged = ClickEvent::point(21.0, 20.0, 1_000).with_extra_info(genuine.extra_info);

        // Act
        let result = service.check_extra_info(&forged);

        // Assert
        assert!(matches!(
            result,
            Err(SecCompError::Backend { code: ERR_SIGNATURE_MISMATCH, .. })
        ));
    }

    #[test]
    fn test_signature_under_other_key_is_rejected() {
        let service = HmacServiceBackend::new(b"another key".to_vec());
        let event = signed(ClickEvent::key(2054, 1_000));
        assert!(service.check_extra_info(&event).is_err());
    }

    #[test]
    fn test_disabled_input_enhance_refuses_clicks() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        let event = signed(ClickEvent::point(20.0, 20.0, 1_000));

        service.disable_input_enhance().unwrap();
        assert!(service.check_extra_info(&event).is_err());
        service.enable_input_enhance().unwrap();
        assert!(service.check_extra_info(&event).is_ok());
    }

    #[test]
    fn test_key_rotation_changes_signatures() {
        let input = HmacInputBackend::new(KEY.to_vec());
        let bytes = signing_bytes(&ClickEvent::point(1.0, 1.0, 1));
        let before = input.get_pointer_event_data(&bytes).unwrap();

        input.set_config(b"rotated").unwrap();

        assert_ne!(input.get_pointer_event_data(&bytes).unwrap(), before);
        assert!(input.set_config(&[]).is_err());
    }

    // ── Component attestation ────────────────────────────────────────────────

    #[test]
    fn test_client_attestation_is_accepted_by_service() {
        // Arrange
        let client = HmacClientBackend::new(KEY.to_vec());
        let service = HmacServiceBackend::new(KEY.to_vec());
        let mut info = descriptor().to_json().unwrap();

        // Act
        client
            .preprocess_component_info(CallsiteToken(1), &mut info)
            .unwrap();
        let attested = ComponentDescriptor::from_json(&info).unwrap();

        // Assert
        assert_eq!(attested.enhance_metadata.len(), TAG_LEN);
        assert!(service.check_component_info(1, &attested, &info).is_ok());
    }

    #[test]
    fn test_tampered_attested_descriptor_is_rejected() {
        let client = HmacClientBackend::new(KEY.to_vec());
        let service = HmacServiceBackend::new(KEY.to_vec());
        let mut info = descriptor().to_json().unwrap();
        client
            .preprocess_component_info(CallsiteToken(1), &mut info)
            .unwrap();
        let mut attested = ComponentDescriptor::from_json(&info).unwrap();
        attested.rect.width = 5000.0;

        assert!(service.check_component_info(1, &attested, &info).is_err());
    }

    #[test]
    fn test_unattested_descriptor_is_accepted() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        assert!(service.check_component_info(1, &descriptor(), "{}").is_ok());
    }

    // ── Payload tagging ──────────────────────────────────────────────────────

    #[test]
    fn test_client_tagged_payload_is_untagged_by_service() {
        let client = HmacClientBackend::new(KEY.to_vec());
        let service = HmacServiceBackend::new(KEY.to_vec());
        let buffer = MessageBuffer::from_vec(b"report click".to_vec());

        let raw = client.serialize(CallsiteToken(5), &buffer).unwrap();
        let back = service.deserialize(&raw).unwrap();

        assert_eq!(raw.as_bytes().len(), buffer.len() + TAG_LEN);
        assert_eq!(back, buffer);
    }

    #[test]
    fn test_corrupted_payload_fails_to_deserialize() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        let raw = service
            .serialize(&MessageBuffer::from_vec(vec![1, 2, 3]))
            .unwrap();
        let mut bytes = raw.as_bytes().to_vec();
        bytes[0] ^= 0xFF;

        let result = service.deserialize(&RawData::from_bytes(bytes).unwrap());

        assert!(matches!(
            result,
            Err(SecCompError::Backend { code: ERR_SIGNATURE_MISMATCH, .. })
        ));
    }

    #[test]
    fn test_short_or_null_payload_fails_to_deserialize() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        assert!(service.deserialize(&RawData::null()).is_err());
        assert!(service
            .deserialize(&RawData::from_bytes(vec![0; 4]).unwrap())
            .is_err());
    }

    // ── Process tracking ─────────────────────────────────────────────────────

    #[test]
    fn test_process_tracking_follows_lifecycle_hooks() {
        let service = HmacServiceBackend::new(KEY.to_vec());
        service.start_service();
        service.add_process(10);
        service.add_process(11);
        service.notify_process_died(10);

        assert!(service.is_running());
        assert!(!service.tracks_process(10));
        assert!(service.tracks_process(11));

        service.exit_service();
        assert!(!service.is_running());
        assert!(!service.tracks_process(11));
    }

    #[test]
    fn test_client_remembers_component_per_callsite() {
        let client = HmacClientBackend::new(KEY.to_vec());
        client.register_component_id(CallsiteToken(3), 12).unwrap();
        assert_eq!(client.components_at(CallsiteToken(3)), vec![12]);
        client.unregister_component_id(CallsiteToken(3), 12).unwrap();
        assert!(client.components_at(CallsiteToken(3)).is_empty());
        assert!(!client.is_registered(12));
    }

    #[test]
    fn test_client_unregister_keeps_sibling_from_same_callsite() {
        // Arrange
        let client = HmacClientBackend::new(KEY.to_vec());
        client.register_component_id(CallsiteToken(3), 1).unwrap();
        client.register_component_id(CallsiteToken(3), 2).unwrap();

        // Act
        client.unregister_component_id(CallsiteToken(3), 1).unwrap();

        // Assert
        assert!(!client.is_registered(1));
        assert!(client.is_registered(2));
        assert_eq!(client.components_at(CallsiteToken(3)), vec![2]);
    }
}
