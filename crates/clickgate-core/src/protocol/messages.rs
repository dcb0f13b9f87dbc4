//! Wire layout constants for click events.
//!
//! ```text
//! Point: [kind=0x01:1][touch_x:f64][touch_y:f64][timestamp_us:u64]      = 25 bytes
//! Key:   [kind=0x02:1][timestamp_us:u64][key_code:u32]                   = 13 bytes
//! then optionally: [extra_size:u32][extra_bytes:extra_size]
//! ```
//!
//! All multi-byte fields are big-endian; floats are IEEE-754 binary64.

/// Size of the kind discriminant.
pub const KIND_SIZE: usize = 1;

/// Size of the point body (after the discriminant).
pub const POINT_BODY_SIZE: usize = 8 + 8 + 8;

/// Size of the key body (after the discriminant).
pub const KEY_BODY_SIZE: usize = 8 + 4;

/// Size of the extra-info length prefix.
pub const EXTRA_INFO_HEADER_SIZE: usize = 4;

/// Largest authenticity payload accepted on the wire.
pub const MAX_EXTRA_INFO_SIZE: usize = 0x1000;
