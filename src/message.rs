//! Application-visible messages: the sum type callers actually see, plus the fragmentation
//! logic that turns an outgoing data message into one or more wire frames.

use crate::frame::{Frame, Opcode};

/// One logical application payload, per the GLOSSARY definition of "Message".
///
/// `Ping`/`Pong`/`Close` only reach the caller in the cases carved out by §4.3: an
/// undeliverable ping (pong couldn't be sent), and the terminal close notification. Ordinary
/// pings are answered automatically and never surface here.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Close code validity per RFC 6455 §7.4: 1000-1011 excluding the three codes reserved for
/// local use only (never legal on the wire), plus the private-use range 3000-4999.
pub fn is_valid_close_code(code: u16) -> bool {
    match code {
        1004 | 1005 | 1006 => false,
        1000..=1011 => true,
        3000..=4999 => true,
        _ => false,
    }
}

impl Message {
    pub(crate) fn opcode(&self) -> Opcode {
        match self {
            Message::Text(_) => Opcode::Text,
            Message::Binary(_) => Opcode::Binary,
            Message::Ping(_) => Opcode::Ping,
            Message::Pong(_) => Opcode::Pong,
            Message::Close { .. } => Opcode::Close,
        }
    }

    /// Serializes this message into the single payload a frame (or the first frame of a
    /// fragmented sequence) would carry. Close frames encode `code` big-endian followed by
    /// the UTF-8 reason, per §6; a code of 0 with an empty reason is `CloseFrame`'s "no
    /// status" form and is written as a fully empty payload.
    pub(crate) fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
            Message::Ping(data) => data,
            Message::Pong(data) => data,
            Message::Close { code, reason } => {
                if code == 0 && reason.is_empty() {
                    Vec::new()
                } else {
                    let mut payload = Vec::with_capacity(2 + reason.len());
                    payload.extend_from_slice(&code.to_be_bytes());
                    payload.extend_from_slice(reason.as_bytes());
                    payload
                }
            }
        }
    }

    /// Splits a data message (`Text`/`Binary`) into frames, fragmenting at `buffer_size` when
    /// given. Control messages (`Ping`/`Pong`/`Close`) are never fragmented regardless of
    /// `buffer_size`, per §4.4.
    pub(crate) fn into_frames(self, buffer_size: Option<usize>) -> Vec<Frame> {
        let opcode = self.opcode();
        if opcode.is_control() {
            return vec![Frame::new(true, opcode, self.into_payload())];
        }

        let payload = self.into_payload();
        let chunk_size = buffer_size.filter(|&n| n > 0 && n < payload.len());
        let Some(chunk_size) = chunk_size else {
            return vec![Frame::new(true, opcode, payload)];
        };

        let mut frames = Vec::new();
        for chunk in payload.chunks(chunk_size) {
            let frame_opcode = if frames.is_empty() {
                opcode
            } else {
                Opcode::Continuation
            };
            frames.push(Frame::new(false, frame_opcode, chunk.to_vec()));
        }
        if let Some(last) = frames.last_mut() {
            last.fin = true;
        }
        frames
    }
}
