//! Protocol module containing the click event wire format and the
//! transport-side buffer type.

pub mod buffer;
pub mod codec;
pub mod messages;

pub use buffer::MessageBuffer;
pub use codec::{decode_click_event, encode_click_event, signing_bytes, ProtocolError};
