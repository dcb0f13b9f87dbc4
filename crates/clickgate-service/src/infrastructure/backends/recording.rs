//! Recording enhance backend for test rigs.
//!
//! Implements every role, accepts everything unless told to fail, copies
//! payloads unchanged and records each call so tests can assert on what the
//! adapter forwarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use clickgate_core::enhance::{ClientEnhanceBackend, InputEnhanceBackend, ServiceEnhanceBackend};
use clickgate_core::protocol::MessageBuffer;
use clickgate_core::{
    CallsiteToken, ClickEvent, ComponentDescriptor, ComponentId, RawData, SecCompError,
};

/// Status code returned by every verdict-bearing call while failing.
pub const ERR_RECORDING_REJECT: i32 = -1100;

/// One forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    SetConfig(Vec<u8>),
    GetPointerEventData(Vec<u8>),
    CheckExtraInfo { size: u32 },
    EnableInputEnhance,
    DisableInputEnhance,
    CheckComponentInfo { pid: i32 },
    StartService,
    ExitService,
    NotifyProcessDied(i32),
    AddProcess(i32),
    RemoveProcess(i32),
    PreprocessComponentInfo(CallsiteToken),
    RegisterComponentId(CallsiteToken, ComponentId),
    UnregisterComponentId(CallsiteToken, ComponentId),
    Serialize(usize),
    Deserialize(u32),
}

#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<RecordedCall>>,
    should_fail: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every verdict-bearing call fail from now on.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the calls seen so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn verdict(&self) -> Result<(), SecCompError> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(SecCompError::Backend {
                code: ERR_RECORDING_REJECT,
                reason: "recording backend told to fail".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl InputEnhanceBackend for RecordingBackend {
    fn set_config(&self, config: &[u8]) -> Result<(), SecCompError> {
        self.record(RecordedCall::SetConfig(config.to_vec()));
        self.verdict()
    }

    fn get_pointer_event_data(&self, event_data: &[u8]) -> Result<Vec<u8>, SecCompError> {
        self.record(RecordedCall::GetPointerEventData(event_data.to_vec()));
        self.verdict()?;
        Ok(event_data.to_vec())
    }
}

impl ServiceEnhanceBackend for RecordingBackend {
    fn check_extra_info(&self, event: &ClickEvent) -> Result<(), SecCompError> {
        self.record(RecordedCall::CheckExtraInfo {
            size: event.extra_info.size,
        });
        self.verdict()
    }

    fn enable_input_enhance(&self) -> Result<(), SecCompError> {
        self.record(RecordedCall::EnableInputEnhance);
        self.verdict()
    }

    fn disable_input_enhance(&self) -> Result<(), SecCompError> {
        self.record(RecordedCall::DisableInputEnhance);
        self.verdict()
    }

    fn check_component_info(
        &self,
        pid: i32,
        _descriptor: &ComponentDescriptor,
        _raw_json: &str,
    ) -> Result<(), SecCompError> {
        self.record(RecordedCall::CheckComponentInfo { pid });
        self.verdict()
    }

    fn start_service(&self) {
        self.record(RecordedCall::StartService);
    }

    fn exit_service(&self) {
        self.record(RecordedCall::ExitService);
    }

    fn notify_process_died(&self, pid: i32) {
        self.record(RecordedCall::NotifyProcessDied(pid));
    }

    fn add_process(&self, pid: i32) {
        self.record(RecordedCall::AddProcess(pid));
    }

    fn remove_process(&self, pid: i32) {
        self.record(RecordedCall::RemoveProcess(pid));
    }

    fn serialize(&self, input: &MessageBuffer) -> Result<RawData, SecCompError> {
        self.record(RecordedCall::Serialize(input.len()));
        RawData::from_bytes(input.as_bytes().to_vec())
    }

    fn deserialize(&self, input: &RawData) -> Result<MessageBuffer, SecCompError> {
        self.record(RecordedCall::Deserialize(input.size));
        input.validate()?;
        Ok(MessageBuffer::from_vec(input.as_bytes().to_vec()))
    }
}

impl ClientEnhanceBackend for RecordingBackend {
    fn preprocess_component_info(
        &self,
        callsite: CallsiteToken,
        _component_info: &mut String,
    ) -> Result<(), SecCompError> {
        self.record(RecordedCall::PreprocessComponentInfo(callsite));
        self.verdict()
    }

    fn register_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        self.record(RecordedCall::RegisterComponentId(callsite, sc_id));
        self.verdict()
    }

    fn unregister_component_id(
        &self,
        callsite: CallsiteToken,
        sc_id: ComponentId,
    ) -> Result<(), SecCompError> {
        self.record(RecordedCall::UnregisterComponentId(callsite, sc_id));
        self.verdict()
    }

    fn serialize(
        &self,
        _callsite: CallsiteToken,
        input: &MessageBuffer,
    ) -> Result<RawData, SecCompError> {
        ServiceEnhanceBackend::serialize(self, input)
    }

    fn deserialize(
        &self,
        _callsite: CallsiteToken,
        input: &RawData,
    ) -> Result<MessageBuffer, SecCompError> {
        ServiceEnhanceBackend::deserialize(self, input)
    }
}
