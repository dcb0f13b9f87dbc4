//! Click events as delivered by the input layer.
//!
//! A click is either a pointer touch at a screen coordinate or an activation
//! key press.  Both carry a monotonic timestamp in microseconds and an
//! optional authenticity payload ([`ExtraInfo`]) produced by the input layer
//! (typically an HMAC or a hardware-backed signature over the event).

use serde::{Deserialize, Serialize};

use crate::error::SecCompError;

/// Discriminant of the click event on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClickEventType {
    Point = 0x01,
    Key = 0x02,
}

impl TryFrom<u8> for ClickEventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ClickEventType::Point),
            0x02 => Ok(ClickEventType::Key),
            _ => Err(()),
        }
    }
}

/// The variant-specific part of a click event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClickKind {
    /// A pointer touch at `(touch_x, touch_y)` in screen coordinates.
    Point {
        touch_x: f64,
        touch_y: f64,
        timestamp_us: u64,
    },
    /// A key press on the focused component.
    Key { key_code: u32, timestamp_us: u64 },
}

/// Authenticity payload attached to a click by the input layer.
///
/// The pair `(size, data)` must be either fully absent (`0`, `None`) or fully
/// present (`size > 0`, `Some(bytes)` with `bytes.len() == size`).  Any other
/// combination is a structurally invalid payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfo {
    /// Declared payload length in bytes.
    pub size: u32,
    /// Payload bytes, `None` when the input layer supplied nothing.
    pub data: Option<Vec<u8>>,
}

impl ExtraInfo {
    /// An absent payload.
    pub fn absent() -> Self {
        Self::default()
    }

    /// A present payload whose declared size matches `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] if `bytes` is longer than a
    /// `u32` size can declare.
    pub fn present(bytes: Vec<u8>) -> Result<Self, SecCompError> {
        let size = payload_size(bytes.len())?;
        Ok(Self {
            size,
            data: Some(bytes),
        })
    }

    /// Returns `true` when a non-empty payload with a matching size is present.
    pub fn is_present(&self) -> bool {
        match &self.data {
            Some(bytes) => self.size > 0 && bytes.len() == self.size as usize,
            None => false,
        }
    }

    /// Checks the absent-or-present invariant.
    ///
    /// # Errors
    ///
    /// Returns [`SecCompError::InvalidValue`] for a half-present payload, e.g.
    /// bytes with a zero size or a non-zero size with no bytes.
    pub fn validate(&self) -> Result<(), SecCompError> {
        match (&self.data, self.size) {
            (None, 0) => Ok(()),
            (Some(bytes), n) if n > 0 && bytes.len() == n as usize => Ok(()),
            (None, n) => Err(SecCompError::InvalidValue(format!(
                "extra info declares {n} bytes but has no data"
            ))),
            (Some(bytes), n) => Err(SecCompError::InvalidValue(format!(
                "extra info declares {n} bytes but carries {}",
                bytes.len()
            ))),
        }
    }

    /// The payload bytes, empty when absent.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

fn payload_size(len: usize) -> Result<u32, SecCompError> {
    u32::try_from(len).map_err(|_| {
        SecCompError::InvalidValue(format!("extra info of {len} bytes is too large"))
    })
}

/// A click on a security component, as reported by the input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub kind: ClickKind,
    #[serde(default)]
    pub extra_info: ExtraInfo,
}

impl ClickEvent {
    /// Builds a pointer click without an authenticity payload.
    pub fn point(touch_x: f64, touch_y: f64, timestamp_us: u64) -> Self {
        Self {
            kind: ClickKind::Point {
                touch_x,
                touch_y,
                timestamp_us,
            },
            extra_info: ExtraInfo::absent(),
        }
    }

    /// Builds a key click without an authenticity payload.
    pub fn key(key_code: u32, timestamp_us: u64) -> Self {
        Self {
            kind: ClickKind::Key {
                key_code,
                timestamp_us,
            },
            extra_info: ExtraInfo::absent(),
        }
    }

    /// Attaches an authenticity payload.
    pub fn with_extra_info(mut self, extra_info: ExtraInfo) -> Self {
        self.extra_info = extra_info;
        self
    }

    /// Wire discriminant of this event.
    pub fn event_type(&self) -> ClickEventType {
        match self.kind {
            ClickKind::Point { .. } => ClickEventType::Point,
            ClickKind::Key { .. } => ClickEventType::Key,
        }
    }

    /// Monotonic timestamp in microseconds.
    pub fn timestamp_us(&self) -> u64 {
        match self.kind {
            ClickKind::Point { timestamp_us, .. } | ClickKind::Key { timestamp_us, .. } => {
                timestamp_us
            }
        }
    }
}
