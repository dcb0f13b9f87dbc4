//! Domain entities for the click trust pipeline.
//!
//! This module contains plain data types and pure rules with no dependency
//! on the enhance backends, the IPC transport, or the service registry.
//! Everything here can be constructed and tested in isolation.

/// Caller identity and callsite tokens.
pub mod caller;

/// Click events and their authenticity payloads.
pub mod click;

/// Security component descriptors and geometry.
pub mod component;

/// Process-unique component id allocation.
pub mod id_allocator;

/// Length-prefixed buffers exchanged with enhance backends.
pub mod raw_data;
