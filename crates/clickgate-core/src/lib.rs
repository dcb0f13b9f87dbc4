//! # clickgate-core
//!
//! Click trust verification core: decides whether a click on a security
//! component was genuinely made by a user before a temporary permission is
//! granted.
//!
//! The crate has no OS, IPC or UI dependencies.  The service binary wires it
//! to real collaborators.
//!
//! # Architecture overview (for beginners)
//!
//! An application draws a *security component* (a "use precise location",
//! "paste" or "save" button).  When the user taps it, the input layer signs
//! the tap and the service asks this crate whether to trust it:
//!
//! - **`domain`** – Plain data: click events, component descriptors, caller
//!   identity, raw payload buffers and the component id allocator.
//!
//! - **`enhance`** – The [`EnhanceAdapter`].  Optional backends (HMAC keys,
//!   hardware attestation) verify click authenticity; when a backend is
//!   missing every call has a safe, fail-closed fallback.
//!
//! - **`trust`** – One [`TrustRecord`] per component.  It checks that a click
//!   is recent, lands on the component and is authentic, and it flips the
//!   grant state.  [`TrustState`] models the confirmation-dialog lifecycle.
//!
//! - **`protocol`** – The big-endian wire format of a click event and the
//!   canonical bytes a backend signs.

pub mod domain;
pub mod enhance;
pub mod error;
pub mod protocol;
pub mod trust;

pub use domain::caller::{CallerInfo, CallsiteToken};
pub use domain::click::{ClickEvent, ClickEventType, ClickKind, ExtraInfo};
pub use domain::component::{ComponentDescriptor, ComponentId, ComponentType, Rect};
pub use domain::id_allocator::ComponentIdAllocator;
pub use domain::raw_data::RawData;
pub use enhance::{BackendCatalog, BackendRole, EnhanceAdapter, SlotStatus};
pub use error::SecCompError;
pub use protocol::{decode_click_event, encode_click_event, signing_bytes, MessageBuffer, ProtocolError};
pub use trust::{
    AuditEvent, AuditSink, MonotonicClock, PermissionBookkeeper, SystemMonotonicClock,
    TrustEvent, TrustRecord, TrustState, VerifyContext,
};
