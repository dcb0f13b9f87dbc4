//! `EnhanceAdapter`: the uniform call surface over optional enhance backends.
//!
//! # Lifecycle (for beginners)
//!
//! The adapter is an ordinary owned value.  The service creates one at
//! start-up from a [`BackendCatalog`] and shares it (usually behind an `Arc`)
//! with everything that verifies clicks.  Dropping it tears every loaded
//! backend down; there is no separate unload call.
//!
//! Each role has a slot.  The first call that needs a role loads that role's
//! backend; the outcome, success or failure, is remembered for the lifetime
//! of the adapter and loading is never retried:
//!
//! ```text
//! NotAttempted ──first use──► Loaded
//!       │
//!       └──────first use──► Unavailable   (load failed; fallbacks apply)
//! ```
//!
//! # Locking
//!
//! All three slots share one init lock, held only while a load runs.  Once a
//! slot is initialised its handle is read through a `OnceLock` without any
//! lock, so forwarding calls on different roles or component ids never
//! contend.
//!
//! # Fallbacks
//!
//! | Call family                                   | No backend              |
//! |-----------------------------------------------|-------------------------|
//! | config / pointer data / `check_extra_info`    | `EnhanceUnavailable`    |
//! | lifecycle hooks, component id registration    | `Ok(())` no-op          |
//! | `check_component_info`, preprocessing         | `Ok(())`                |
//! | serialize / deserialize                       | byte-exact copy         |

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, error, info, warn};

use crate::domain::caller::CallsiteToken;
use crate::domain::click::ClickEvent;
use crate::domain::component::{ComponentDescriptor, ComponentId};
use crate::domain::raw_data::RawData;
use crate::enhance::backend::{
    BackendRole, ClientEnhanceBackend, InputEnhanceBackend, ServiceEnhanceBackend,
};
use crate::enhance::catalog::{module_id, BackendCatalog, LoadError};
use crate::error::SecCompError;
use crate::protocol::buffer::MessageBuffer;

/// Observable state of one role's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    NotAttempted,
    Loaded,
    Unavailable,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SlotStatus::NotAttempted => "not attempted",
            SlotStatus::Loaded => "loaded",
            SlotStatus::Unavailable => "unavailable",
        };
        f.write_str(text)
    }
}

/// One role's backend handle.
///
/// The outer `OnceLock` is the attempted-once flag; the inner `Option` is
/// the handle, `None` when the load failed.
struct BackendSlot<T: ?Sized> {
    handle: OnceLock<Option<Arc<T>>>,
}

impl<T: ?Sized> BackendSlot<T> {
    fn new() -> Self {
        Self {
            handle: OnceLock::new(),
        }
    }

    fn is_attempted(&self) -> bool {
        self.handle.get().is_some()
    }

    fn get(&self) -> Option<&Arc<T>> {
        self.handle.get().and_then(Option::as_ref)
    }

    fn status(&self) -> SlotStatus {
        match self.handle.get() {
            None => SlotStatus::NotAttempted,
            Some(Some(_)) => SlotStatus::Loaded,
            Some(None) => SlotStatus::Unavailable,
        }
    }
}

/// Owns the backend slots and forwards calls to loaded backends, falling
/// back to safe defaults otherwise.
pub struct EnhanceAdapter {
    catalog: BackendCatalog,
    init_lock: Mutex<()>,
    input: BackendSlot<dyn InputEnhanceBackend>,
    service: BackendSlot<dyn ServiceEnhanceBackend>,
    client: BackendSlot<dyn ClientEnhanceBackend>,
}

impl fmt::Debug for EnhanceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhanceAdapter")
            .field("catalog", &self.catalog)
            .field("input", &self.input.status())
            .field("service", &self.service.status())
            .field("client", &self.client.status())
            .finish()
    }
}

impl Default for EnhanceAdapter {
    fn default() -> Self {
        Self::new(BackendCatalog::new())
    }
}

impl EnhanceAdapter {
    /// Creates an adapter with every slot uninitialised.
    pub fn new(catalog: BackendCatalog) -> Self {
        Self {
            catalog,
            init_lock: Mutex::new(()),
            input: BackendSlot::new(),
            service: BackendSlot::new(),
            client: BackendSlot::new(),
        }
    }

    // ── Initialisation ───────────────────────────────────────────────────────

    /// Attempts to load `role`'s backend, at most once per adapter.
    ///
    /// Load failures are logged and leave the slot empty; they are never
    /// reported to the caller.
    pub fn init_backend(&self, role: BackendRole) {
        match role {
            BackendRole::Input => self.init_slot(&self.input, role, || self.catalog.load_input()),
            BackendRole::Service => {
                self.init_slot(&self.service, role, || self.catalog.load_service())
            }
            BackendRole::Client => {
                self.init_slot(&self.client, role, || self.catalog.load_client())
            }
        }
    }

    fn init_slot<T: ?Sized>(
        &self,
        slot: &BackendSlot<T>,
        role: BackendRole,
        load: impl FnOnce() -> Result<Arc<T>, LoadError>,
    ) {
        if slot.is_attempted() {
            return;
        }
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_attempted() {
            return;
        }

        let handle = match load() {
            Ok(backend) => {
                info!(%role, module = module_id(role), "enhance backend loaded");
                Some(backend)
            }
            Err(e) => {
                warn!(%role, "enhance backend unavailable, using fallback: {e}");
                None
            }
        };
        // Only this thread can reach here for this slot: the lock is held and
        // the slot was observed unset under it.
        let _ = slot.handle.set(handle);
    }

    /// Current state of `role`'s slot, without triggering a load.
    pub fn slot_status(&self, role: BackendRole) -> SlotStatus {
        match role {
            BackendRole::Input => self.input.status(),
            BackendRole::Service => self.service.status(),
            BackendRole::Client => self.client.status(),
        }
    }

    /// Slot state of every role, in [`BackendRole::ALL`] order.
    pub fn status(&self) -> [(BackendRole, SlotStatus); 3] {
        BackendRole::ALL.map(|role| (role, self.slot_status(role)))
    }

    /// Ensures `role` was attempted and reports whether a backend is loaded.
    pub fn is_available(&self, role: BackendRole) -> bool {
        self.init_backend(role);
        self.slot_status(role) == SlotStatus::Loaded
    }

    fn input_backend(&self) -> Option<&Arc<dyn InputEnhanceBackend>> {
        self.init_backend(BackendRole::Input);
        self.input.get()
    }

    fn service_backend(&self) -> Option<&Arc<dyn ServiceEnhanceBackend>> {
        self.init_backend(BackendRole::Service);
        self.service.get()
    }

    fn client_backend(&self) -> Option<&Arc<dyn ClientEnhanceBackend>> {
        self.init_backend(BackendRole::Client);
        self.client.get()
    }

    // ── Input role ───────────────────────────────────────────────────────────

    /// Pushes configuration to the input-layer backend.
    ///
    /// # Errors
    ///
    /// [`SecCompError::EnhanceUnavailable`] without an input backend.
    pub fn set_enhance_config(&self, config: &[u8]) -> Result<(), SecCompError> {
        match self.input_backend() {
            Some(backend) => backend.set_config(config),
            None => Err(SecCompError::EnhanceUnavailable),
        }
    }

    /// Asks the input-layer backend for a pointer event's authenticity payload.
    ///
    /// # Errors
    ///
    /// [`SecCompError::EnhanceUnavailable`] without an input backend.
    pub fn get_pointer_event_enhance_data(
        &self,
        event_data: &[u8],
    ) -> Result<Vec<u8>, SecCompError> {
        match self.input_backend() {
            Some(backend) => backend.get_pointer_event_data(event_data),
            None => Err(SecCompError::EnhanceUnavailable),
        }
    }

    // ── Service role ─────────────────────────────────────────────────────────

    /// Verifies the authenticity payload of `event`.
    ///
    /// A structurally missing payload is rejected before any backend is
    /// consulted.  A missing backend is never an automatic pass.
    ///
    /// # Errors
    ///
    /// [`SecCompError::ClickEventInvalid`] for a missing payload,
    /// [`SecCompError::EnhanceUnavailable`] without a service backend, or
    /// whatever the backend reports.
    pub fn check_extra_info(&self, event: &ClickEvent) -> Result<(), SecCompError> {
        if !event.extra_info.is_present() {
            warn!(
                size = event.extra_info.size,
                has_data = event.extra_info.data.is_some(),
                "click event extra info is missing"
            );
            return Err(SecCompError::ClickEventInvalid);
        }
        match self.service_backend() {
            Some(backend) => backend.check_extra_info(event),
            None => {
                debug!("no service backend to verify click extra info");
                Err(SecCompError::EnhanceUnavailable)
            }
        }
    }

    pub fn enable_input_enhance(&self) -> Result<(), SecCompError> {
        match self.service_backend() {
            Some(backend) => backend.enable_input_enhance(),
            None => Ok(()),
        }
    }

    pub fn disable_input_enhance(&self) -> Result<(), SecCompError> {
        match self.service_backend() {
            Some(backend) => backend.disable_input_enhance(),
            None => Ok(()),
        }
    }

    /// Lets the service backend object to a component descriptor.
    ///
    /// # Errors
    ///
    /// Only what the backend reports; no backend means no objection.
    pub fn check_component_info(
        &self,
        pid: i32,
        descriptor: &ComponentDescriptor,
        raw_json: &str,
    ) -> Result<(), SecCompError> {
        match self.service_backend() {
            Some(backend) => backend.check_component_info(pid, descriptor, raw_json),
            None => Ok(()),
        }
    }

    pub fn start_service(&self) {
        if let Some(backend) = self.service_backend() {
            backend.start_service();
        }
    }

    pub fn exit_service(&self) {
        if let Some(backend) = self.service_backend() {
            backend.exit_service();
        }
    }

    pub fn notify_process_died(&self, pid: i32) {
        if let Some(backend) = self.service_backend() {
            backend.notify_process_died(pid);
        }
    }

    pub fn add_process(&self, pid: i32) {
        if let Some(backend) = self.service_backend() {
            backend.add_process(pid);
        }
    }

    pub fn remove_process(&self, pid: i32) {
        if let Some(backend) = self.service_backend() {
            backend.remove_process(pid);
        }
    }

    /// Service-side serialization of an outgoing payload.
    ///
    /// # Errors
    ///
    /// Backend errors, or [`SecCompError::InvalidValue`] if the payload does
    /// not fit a `RawData`.
    pub fn service_serialize(&self, input: &MessageBuffer) -> Result<RawData, SecCompError> {
        match self.service_backend() {
            Some(backend) => backend.serialize(input),
            None => copy_into_raw(input),
        }
    }

    /// Service-side deserialization of an incoming payload.
    ///
    /// # Errors
    ///
    /// [`SecCompError::InvalidValue`] if `input` has no backing buffer or an
    /// inconsistent size, or backend errors.
    pub fn service_deserialize(&self, input: &RawData) -> Result<MessageBuffer, SecCompError> {
        match self.service_backend() {
            Some(backend) => backend.deserialize(input),
            None => copy_from_raw(input),
        }
    }

    // ── Client role ──────────────────────────────────────────────────────────

    /// Lets the client backend annotate serialized component info.
    ///
    /// # Errors
    ///
    /// Only what the backend reports; without one the info is left untouched.
    pub fn preprocess_component_info(
        &self,
        callsite: CallsiteToken,
        component_info: &mut String,
    ) -> Result<(), SecCompError> {
        match self.client_backend() {
            Some(backend) => backend.preprocess_component_info(callsite, component_info),
            None => Ok(()),
        }
    }

    pub fn register_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        match self.client_backend() {
            Some(backend) => backend.register_component_id(callsite, sc_id),
            None => Ok(()),
        }
    }

    pub fn unregister_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        match self.client_backend() {
            Some(backend) => backend.unregister_component_id(callsite, sc_id),
            None => Ok(()),
        }
    }

    /// Client-side serialization of an outgoing payload.
    ///
    /// # Errors
    ///
    /// See [`service_serialize`](Self::service_serialize).
    pub fn client_serialize(
        &self,
        callsite: CallsiteToken,
        input: &MessageBuffer,
    ) -> Result<RawData, SecCompError> {
        match self.client_backend() {
            Some(backend) => backend.serialize(callsite, input),
            None => copy_into_raw(input),
        }
    }

    /// Client-side deserialization of an incoming payload.
    ///
    /// # Errors
    ///
    /// See [`service_deserialize`](Self::service_deserialize).
    pub fn client_deserialize(
        &self,
        callsite: CallsiteToken,
        input: &RawData,
    ) -> Result<MessageBuffer, SecCompError> {
        match self.client_backend() {
            Some(backend) => backend.deserialize(callsite, input),
            None => copy_from_raw(input),
        }
    }
}

// ── Fallback copies ───────────────────────────────────────────────────────────

/// Copies a transport buffer into `RawData`.  An empty source carries
/// nothing, so no copy is made and an empty payload is returned.
fn copy_into_raw(input: &MessageBuffer) -> Result<RawData, SecCompError> {
    if input.is_empty() {
        return Ok(RawData::empty());
    }
    RawData::from_bytes(input.as_bytes().to_vec())
}

/// Copies `RawData` back into a transport buffer.
fn copy_from_raw(input: &RawData) -> Result<MessageBuffer, SecCompError> {
    let Some(bytes) = input.data.as_ref() else {
        error!(size = input.size, "deserialize called with a null raw data buffer");
        return Err(SecCompError::InvalidValue(
            "raw data has no backing buffer".to_string(),
        ));
    };
    if let Err(e) = input.validate() {
        error!("deserialize called with inconsistent raw data: {e}");
        return Err(e);
    }
    Ok(MessageBuffer::from_vec(bytes.clone()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
