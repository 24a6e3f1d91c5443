//! Wire framing for protocol messages
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! | length         | payload          |
//! | (4 bytes, BE)  | (JSON Message)   |
//! +----------------+------------------+
//! ```
//!
//! The length prefix makes each message self-delimiting, so back-to-back
//! messages on a byte stream are individually recoverable in order.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChatError, Result};
use crate::message::Message;

/// Frame header size: 4-byte payload length
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum frame payload size (64 KiB) - a chat line never comes close
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode one message into a self-delimiting frame
pub fn encode(message: &Message) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ChatError::MalformedMessage(format!(
            "payload too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Try to decode one message from the front of `buf`
///
/// Returns `Ok(None)` if the buffer does not yet hold a complete frame;
/// consumes exactly one frame otherwise. A zero-length or oversized frame, or
/// a payload that is not a valid message encoding, is a `MalformedMessage`.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    // Peek at the header without consuming it
    let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if payload_len == 0 {
        return Err(ChatError::MalformedMessage("empty frame".to_string()));
    }
    if payload_len > MAX_FRAME_SIZE {
        return Err(ChatError::MalformedMessage(format!(
            "frame too large: {} bytes (max {})",
            payload_len, MAX_FRAME_SIZE
        )));
    }

    if buf.len() < FRAME_HEADER_SIZE + payload_len {
        return Ok(None);
    }

    buf.advance(FRAME_HEADER_SIZE);
    let payload = buf.split_to(payload_len);
    let message = serde_json::from_slice(&payload)?;
    Ok(Some(message))
}
