//! Capability traits implemented by enhance backends, one per role.
//!
//! A backend provides stronger click authenticity verification than the
//! core can do on its own (HMAC keys held by the input stack, hardware-backed
//! attestation, ...).  Backends are optional: every call the adapter makes on
//! them has a defined fallback when the role has no backend loaded.
//!
//! Implementations must be safe to call concurrently from several worker
//! threads; the adapter does not serialize forwarding calls.

use std::fmt;

use crate::domain::caller::CallsiteToken;
use crate::domain::click::ClickEvent;
use crate::domain::component::{ComponentDescriptor, ComponentId};
use crate::domain::raw_data::RawData;
use crate::error::SecCompError;
use crate::protocol::buffer::MessageBuffer;

/// The three independent backend roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendRole {
    /// Runs next to the input stack; signs pointer events.
    Input,
    /// Runs inside the security component service; verifies clicks.
    Service,
    /// Runs inside the application process; tags components and payloads.
    Client,
}

impl BackendRole {
    pub const ALL: [BackendRole; 3] = [BackendRole::Input, BackendRole::Service, BackendRole::Client];
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendRole::Input => "input",
            BackendRole::Service => "service",
            BackendRole::Client => "client",
        };
        f.write_str(name)
    }
}

/// Input-layer backend.
pub trait InputEnhanceBackend: Send + Sync {
    /// Pushes backend configuration (keys, policy) to the input layer.
    fn set_config(&self, config: &[u8]) -> Result<(), SecCompError>;

    /// Produces the authenticity payload for a serialized pointer event.
    fn get_pointer_event_data(&self, event_data: &[u8]) -> Result<Vec<u8>, SecCompError>;
}

/// Service-layer backend.
pub trait ServiceEnhanceBackend: Send + Sync {
    /// Verifies the authenticity payload of a click.
    fn check_extra_info(&self, event: &ClickEvent) -> Result<(), SecCompError>;

    fn enable_input_enhance(&self) -> Result<(), SecCompError>;

    fn disable_input_enhance(&self) -> Result<(), SecCompError>;

    /// Validates backend-specific metadata of a component being registered
    /// or updated.  `raw_json` is the descriptor as the application sent it.
    fn check_component_info(
        &self,
        pid: i32,
        descriptor: &ComponentDescriptor,
        raw_json: &str,
    ) -> Result<(), SecCompError>;

    fn start_service(&self);

    fn exit_service(&self);

    fn notify_process_died(&self, pid: i32);

    fn add_process(&self, pid: i32);

    fn remove_process(&self, pid: i32);

    fn serialize(&self, input: &MessageBuffer) -> Result<RawData, SecCompError>;

    fn deserialize(&self, input: &RawData) -> Result<MessageBuffer, SecCompError>;
}

/// Client-layer backend, obtained through a factory entry point.
pub trait ClientEnhanceBackend: Send + Sync {
    /// Rewrites or annotates the serialized component info before it is sent.
    fn preprocess_component_info(
        &self,
        callsite: CallsiteToken,
        component_info: &mut String,
    ) -> Result<(), SecCompError>;

    fn register_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError>;

    fn unregister_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError>;

    fn serialize(
        &self,
        callsite: CallsiteToken,
        input: &MessageBuffer,
    ) -> Result<RawData, SecCompError>;

    fn deserialize(
        &self,
        callsite: CallsiteToken,
        input: &RawData,
    ) -> Result<MessageBuffer, SecCompError>;
}
