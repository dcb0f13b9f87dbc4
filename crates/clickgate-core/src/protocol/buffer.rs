//! Transport-side byte buffer.
//!
//! `MessageBuffer` stands in for the IPC framework's parcel type: an owned,
//! append-only byte buffer that the transport hands to the trust core.  The
//! enhance adapter converts between it and [`RawData`](crate::domain::raw_data::RawData).

/// An owned IPC payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBuffer {
    bytes: Vec<u8>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing bytes without copying.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Appends raw bytes to the end of the buffer.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for MessageBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}
