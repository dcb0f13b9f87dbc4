//! Length-prefixed byte buffer used at the enhance-adapter boundary.
//!
//! When an enhance backend renegotiates the wire format of an IPC payload it
//! receives the transport-side [`MessageBuffer`](crate::protocol::buffer::MessageBuffer)
//! and produces a [`RawData`] (serialize), or the reverse (deserialize).
//! Without a backend the adapter copies the bytes unchanged.

use crate::error::SecCompError;

/// A declared length plus an optional backing buffer.
///
/// `size == 0` is a valid empty payload, with or without a backing buffer.
/// `size > 0` requires `data` to be `Some` and exactly `size` bytes long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawData {
    pub size: u32,
    pub data: Option<Vec<u8>>,
}

impl RawData {
    /// An empty payload with no backing buffer.
    pub fn null() -> Self {
        Self::default()
    }

    /// An empty payload with a (zero-length) backing buffer.
    pub fn empty() -> Self {
        Self {
            size: 0,
            data: Some(Vec::new()),
        }
    }

    /// Wraps `bytes`, setting `size` to their length.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] if `bytes` is longer than
    /// `u32::MAX`.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SecCompError> {
        let size = u32::try_from(bytes.len()).map_err(|_| {
            SecCompError::InvalidValue(format!("raw data of {} bytes is too large", bytes.len()))
        })?;
        Ok(Self {
            size,
            data: Some(bytes),
        })
    }

    /// `true` when there is no backing buffer at all.
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// Checks the size/buffer invariant.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] when a non-zero size has no
    /// backing buffer or the buffer length disagrees with `size`.
    pub fn validate(&self) -> Result<(), SecCompError> {
        match &self.data {
            None if self.size == 0 => Ok(()),
            None => Err(SecCompError::InvalidValue(format!(
                "raw data declares {} bytes but has no buffer",
                self.size
            ))),
            Some(bytes) if bytes.len() == self.size as usize => Ok(()),
            Some(bytes) => Err(SecCompError::InvalidValue(format!(
                "raw data declares {} bytes but buffer holds {}",
                self.size,
                bytes.len()
            ))),
        }
    }

    /// The payload bytes, empty for a null buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}
