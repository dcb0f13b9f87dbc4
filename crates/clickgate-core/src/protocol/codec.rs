//! Binary codec for click events crossing the input-layer boundary.
//!
//! Wire format (see [`crate::protocol::messages`] for sizes):
//! ```text
//! [kind:1][body:N][extra_size:4][extra_bytes:extra_size]?
//! ```
//! All multi-byte integers are big-endian.  The extra-info tail is optional:
//! a buffer that ends right after the body carries no authenticity payload.

use thiserror::Error;

use crate::domain::click::{ClickEvent, ClickEventType, ClickKind, ExtraInfo};
use crate::protocol::messages::{
    EXTRA_INFO_HEADER_SIZE, KEY_BODY_SIZE, KIND_SIZE, MAX_EXTRA_INFO_SIZE, POINT_BODY_SIZE,
};

/// Errors that can occur during click event encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The kind byte is not a recognized click event type.
    #[error("unknown click event type: 0x{0:02X}")]
    UnknownEventType(u8),

    /// A field value is out of range (non-finite coordinate, oversized payload, ...).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Bytes remain after the declared extra-info payload.
    #[error("{0} unexpected trailing bytes after click event")]
    TrailingBytes(usize),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`ClickEvent`], including its extra-info tail when present.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the extra info is half
/// present (size/data disagree) or larger than [`MAX_EXTRA_INFO_SIZE`].
///
/// # Examples
///
/// ```rust
/// use clickgate_core::domain::click::{ClickEvent, ExtraInfo};
/// use clickgate_core::protocol::codec::{decode_click_event, encode_click_event};
///
/// let event = ClickEvent::point(12.5, 40.0, 1_000)
///     .with_extra_info(ExtraInfo::present(vec![0xAB; 4]).unwrap());
/// let bytes = encode_click_event(&event).unwrap();
/// assert_eq!(decode_click_event(&bytes).unwrap(), event);
/// ```
pub fn encode_click_event(event: &ClickEvent) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = signing_bytes(event);
    let extra = &event.extra_info;
    if extra.validate().is_err() {
        return Err(ProtocolError::MalformedPayload(format!(
            "extra info size {} does not match its data",
            extra.size
        )));
    }
    if extra.is_present() {
        if extra.size as usize > MAX_EXTRA_INFO_SIZE {
            return Err(ProtocolError::MalformedPayload(format!(
                "extra info of {} bytes exceeds limit of {MAX_EXTRA_INFO_SIZE}",
                extra.size
            )));
        }
        buf.extend_from_slice(&extra.size.to_be_bytes());
        buf.extend_from_slice(extra.bytes());
    }
    Ok(buf)
}

/// Canonical encoding of the event without its extra-info tail.
///
/// This is the byte string an input layer signs when it produces the
/// authenticity payload, and what a verifying backend recomputes.
pub fn signing_bytes(event: &ClickEvent) -> Vec<u8> {
    let mut buf = Vec::with_capacity(KIND_SIZE + POINT_BODY_SIZE);
    buf.push(event.event_type() as u8);
    match event.kind {
        ClickKind::Point {
            touch_x,
            touch_y,
            timestamp_us,
        } => {
            buf.extend_from_slice(&touch_x.to_be_bytes());
            buf.extend_from_slice(&touch_y.to_be_bytes());
            buf.extend_from_slice(&timestamp_us.to_be_bytes());
        }
        ClickKind::Key {
            key_code,
            timestamp_us,
        } => {
            buf.extend_from_slice(&timestamp_us.to_be_bytes());
            buf.extend_from_slice(&key_code.to_be_bytes());
        }
    }
    buf
}

/// Decodes one [`ClickEvent`] occupying the whole of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are truncated, the kind is unknown,
/// a coordinate is not finite, or bytes remain after the extra-info payload.
pub fn decode_click_event(bytes: &[u8]) -> Result<ClickEvent, ProtocolError> {
    require_len(bytes, KIND_SIZE)?;
    let kind_byte = bytes[0];
    let event_type =
        ClickEventType::try_from(kind_byte).map_err(|_| ProtocolError::UnknownEventType(kind_byte))?;

    let body = &bytes[KIND_SIZE..];
    let (kind, body_len) = match event_type {
        ClickEventType::Point => (decode_point(body)?, POINT_BODY_SIZE),
        ClickEventType::Key => (decode_key(body)?, KEY_BODY_SIZE),
    };

    let extra_info = decode_extra_info(&body[body_len..])?;
    Ok(ClickEvent { kind, extra_info })
}

// ── Body decoding ─────────────────────────────────────────────────────────────

fn decode_point(p: &[u8]) -> Result<ClickKind, ProtocolError> {
    require_len(p, POINT_BODY_SIZE)?;
    let touch_x = f64::from_bits(read_u64(p, 0)?);
    let touch_y = f64::from_bits(read_u64(p, 8)?);
    if !touch_x.is_finite() || !touch_y.is_finite() {
        return Err(ProtocolError::MalformedPayload(format!(
            "non-finite touch coordinate ({touch_x}, {touch_y})"
        )));
    }
    let timestamp_us = read_u64(p, 16)?;
    Ok(ClickKind::Point {
        touch_x,
        touch_y,
        timestamp_us,
    })
}

fn decode_key(p: &[u8]) -> Result<ClickKind, ProtocolError> {
    require_len(p, KEY_BODY_SIZE)?;
    let timestamp_us = read_u64(p, 0)?;
    let key_code = read_u32(p, 8)?;
    Ok(ClickKind::Key {
        key_code,
        timestamp_us,
    })
}

fn decode_extra_info(tail: &[u8]) -> Result<ExtraInfo, ProtocolError> {
    if tail.is_empty() {
        return Ok(ExtraInfo::absent());
    }
    let size = read_u32(tail, 0)? as usize;
    if size > MAX_EXTRA_INFO_SIZE {
        return Err(ProtocolError::MalformedPayload(format!(
            "extra info of {size} bytes exceeds limit of {MAX_EXTRA_INFO_SIZE}"
        )));
    }
    let payload = &tail[EXTRA_INFO_HEADER_SIZE..];
    if payload.len() < size {
        return Err(ProtocolError::InsufficientData {
            needed: size,
            available: payload.len(),
        });
    }
    if payload.len() > size {
        return Err(ProtocolError::TrailingBytes(payload.len() - size));
    }
    if size == 0 {
        return Ok(ExtraInfo::absent());
    }
    ExtraInfo::present(payload.to_vec())
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::InsufficientData {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    let bytes: [u8; 8] = buf
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        })?;
    Ok(u64::from_be_bytes(bytes))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        })?;
    Ok(u32::from_be_bytes(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
