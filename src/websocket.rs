//! WebSocket frame codec (spec §4.5).

use crate::error::{Mongrel2Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const OPCODE_CONTINUATION: u8 = 0x0;
pub const OPCODE_TEXT: u8 = 0x1;
pub const OPCODE_BINARY: u8 = 0x2;
pub const OPCODE_CLOSE: u8 = 0x8;
pub const OPCODE_PING: u8 = 0x9;
pub const OPCODE_PONG: u8 = 0xA;

/// 1008: "Policy Violation" — the default close status for anything the
/// handler's `handle_websocket` does not recognise (spec §4.5, §4.8).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// A parsed WebSocket frame. Masked payloads are unmasked in place during
/// parsing, matching the wire the server sees (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn is_close(&self) -> bool {
        self.opcode == OPCODE_CLOSE
    }

    pub fn is_data(&self) -> bool {
        matches!(self.opcode, OPCODE_TEXT | OPCODE_BINARY)
    }

    /// Parse the standard layout: FIN/RSV/opcode byte, masked-bit + 7-bit
    /// length, optional extended 16/64-bit length, optional 4-byte mask,
    /// payload.
    pub fn parse(input: &[u8]) -> Result<Frame> {
        if input.len() < 2 {
            return Err(Mongrel2Error::BadRequest("frame shorter than 2 bytes".into()));
        }
        let byte0 = input[0];
        let fin = byte0 & 0x80 != 0;
        let opcode = byte0 & 0x0F;

        let byte1 = input[1];
        let masked = byte1 & 0x80 != 0;
        let len7 = byte1 & 0x7F;

        let mut cursor = 2usize;
        let payload_len: u64 = if len7 == 126 {
            let bytes = get(input, cursor, 2)?;
            cursor += 2;
            u16::from_be_bytes([bytes[0], bytes[1]]) as u64
        } else if len7 == 127 {
            let bytes = get(input, cursor, 8)?;
            cursor += 8;
            u64::from_be_bytes(bytes.try_into().unwrap())
        } else {
            len7 as u64
        };

        let mask = if masked {
            let bytes = get(input, cursor, 4)?;
            cursor += 4;
            Some([bytes[0], bytes[1], bytes[2], bytes[3]])
        } else {
            None
        };

        let payload_len = usize::try_from(payload_len)
            .map_err(|_| Mongrel2Error::BadRequest("frame payload length overflow".into()))?;
        let raw_payload = get(input, cursor, payload_len)?;
        let mut payload = BytesMut::from(raw_payload);
        if let Some(mask) = mask {
            for (i, byte) in payload.iter_mut().enumerate() {
                *byte ^= mask[i % 4];
            }
        }

        Ok(Frame { fin, opcode, payload: payload.freeze() })
    }

    /// Serialise this frame for the wire. Server→client frames are never
    /// masked (spec §4.5).
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        let byte0 = (if self.fin { 0x80 } else { 0 }) | (self.opcode & 0x0F);
        out.put_u8(byte0);

        let len = self.payload.len();
        if len < 126 {
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(126);
            out.put_u16(len as u16);
        } else {
            out.put_u8(127);
            out.put_u64(len as u64);
        }
        out.put_slice(&self.payload);
        out.freeze()
    }
}

fn get(input: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    input
        .get(start..start + len)
        .ok_or_else(|| Mongrel2Error::BadRequest("frame truncated".into()))
}

/// A reply carrying either a data frame or a close frame (spec §3).
#[derive(Debug, Clone)]
pub enum WebSocketResponse {
    Data(Frame),
    Close { status_code: u16, reason: Option<String> },
}

impl WebSocketResponse {
    pub fn text(payload: impl Into<Bytes>) -> Self {
        WebSocketResponse::Data(Frame { fin: true, opcode: OPCODE_TEXT, payload: payload.into() })
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        WebSocketResponse::Data(Frame { fin: true, opcode: OPCODE_BINARY, payload: payload.into() })
    }

    pub fn make_close_frame(status_code: u16) -> Self {
        WebSocketResponse::Close { status_code, reason: None }
    }

    pub fn make_close_frame_with_reason(status_code: u16, reason: impl Into<String>) -> Self {
        WebSocketResponse::Close { status_code, reason: Some(reason.into()) }
    }

    /// Encode to the frame that goes on the wire.
    pub fn to_frame(&self) -> Frame {
        match self {
            WebSocketResponse::Data(frame) => frame.clone(),
            WebSocketResponse::Close { status_code, reason } => {
                let mut payload = BytesMut::new();
                payload.put_u16(*status_code);
                if let Some(reason) = reason {
                    payload.put_slice(reason.as_bytes());
                }
                Frame { fin: true, opcode: OPCODE_CLOSE, payload: payload.freeze() }
            }
        }
    }
}
