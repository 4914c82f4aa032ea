//! Message Assembler: reassembles frames into messages per the continuation table in spec
//! §4.3. Deliberately IO-free — it only ever looks at `Frame`s already read off the wire, so
//! the fragmentation/control-interleaving rules in §8 can be unit-tested without a socket.
//! The Connection Driver (`connection.rs`) owns all the side-effecting parts (auto-pong,
//! close-echo, max-message-size accounting).

use crate::error::{Error, Result};
use crate::frame::{Frame, Opcode};

struct Partial {
    opcode: Opcode,
    buffer: Vec<u8>,
}

/// What the Connection Driver should do after feeding one frame to the assembler.
pub(crate) enum AssemblerOutcome {
    /// A frame that is part of an in-progress fragmented message; nothing to deliver yet.
    Pending,
    /// A complete data message, ready for UTF-8 validation (if text) and delivery.
    Message { opcode: Opcode, data: Vec<u8> },
    /// A ping payload; the driver replies with pong and does not deliver this to the caller.
    Ping(Vec<u8>),
    /// A pong payload; discarded silently.
    Pong(Vec<u8>),
    /// A close frame; the driver echoes close and delivers this to the caller.
    Close(Vec<u8>),
}

pub(crate) struct Assembler {
    partial: Option<Partial>,
    max_message_size: usize,
}

impl Assembler {
    pub(crate) fn new(max_message_size: usize) -> Self {
        Self {
            partial: None,
            max_message_size,
        }
    }

    /// Feeds one frame through the continuation table. Control frames (FIN=1, ≤125 bytes,
    /// already enforced by the Frame Codec) pass through regardless of whether a data message
    /// is partially assembled; everything else follows the two-column table in §4.3.
    pub(crate) fn accept(&mut self, frame: Frame) -> Result<AssemblerOutcome> {
        if frame.opcode.is_control() {
            return Ok(match frame.opcode {
                Opcode::Ping => AssemblerOutcome::Ping(frame.payload),
                Opcode::Pong => AssemblerOutcome::Pong(frame.payload),
                Opcode::Close => AssemblerOutcome::Close(frame.payload),
                _ => unreachable!("is_control() only returns true for ping/pong/close"),
            });
        }

        match (frame.opcode, self.partial.is_some()) {
            (Opcode::Continuation, false) => Err(Error::UnexpectedContinuation),
            (Opcode::Continuation, true) => {
                let partial = self.partial.as_mut().expect("checked above");
                partial.buffer.extend_from_slice(&frame.payload);
                if partial.buffer.len() > self.max_message_size {
                    return Err(Error::MessageTooBig(partial.buffer.len()));
                }
                if frame.fin {
                    let partial = self.partial.take().expect("checked above");
                    Ok(AssemblerOutcome::Message {
                        opcode: partial.opcode,
                        data: partial.buffer,
                    })
                } else {
                    Ok(AssemblerOutcome::Pending)
                }
            }
            (data_opcode, true) => {
                let _ = data_opcode;
                Err(Error::FragmentedMessageInProgress)
            }
            (data_opcode, false) => {
                if frame.payload.len() > self.max_message_size {
                    return Err(Error::MessageTooBig(frame.payload.len()));
                }
                if frame.fin {
                    Ok(AssemblerOutcome::Message {
                        opcode: data_opcode,
                        data: frame.payload,
                    })
                } else {
                    self.partial = Some(Partial {
                        opcode: data_opcode,
                        buffer: frame.payload,
                    });
                    Ok(AssemblerOutcome::Pending)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Frame {
        Frame::new(fin, opcode, payload.to_vec())
    }

    #[test]
    fn single_fin_data_frame_emits_immediately() {
        let mut asm = Assembler::new(1 << 20);
        let outcome = asm.accept(frame(true, Opcode::Text, b"hi")).unwrap();
        match outcome {
            AssemblerOutcome::Message { opcode, data } => {
                assert_eq!(opcode, Opcode::Text);
                assert_eq!(data, b"hi");
            }
            _ => panic!("expected a message"),
        }
    }

    #[test]
    fn fragmented_message_reassembles_on_final_continuation() {
        let mut asm = Assembler::new(1 << 20);
        assert!(matches!(
            asm.accept(frame(false, Opcode::Text, b"AB")).unwrap(),
            AssemblerOutcome::Pending
        ));
        assert!(matches!(
            asm.accept(frame(false, Opcode::Continuation, b"CD")).unwrap(),
            AssemblerOutcome::Pending
        ));
        match asm.accept(frame(true, Opcode::Continuation, b"EF")).unwrap() {
            AssemblerOutcome::Message { opcode, data } => {
                assert_eq!(opcode, Opcode::Text);
                assert_eq!(data, b"ABCDEF");
            }
            _ => panic!("expected a message"),
        }
    }

    #[test]
    fn second_data_opcode_while_partial_is_a_protocol_error() {
        let mut asm = Assembler::new(1 << 20);
        asm.accept(frame(false, Opcode::Text, b"AB")).unwrap();
        let err = asm.accept(frame(true, Opcode::Binary, b"xy")).unwrap_err();
        assert!(matches!(err, Error::FragmentedMessageInProgress));
    }

    #[test]
    fn continuation_without_partial_is_a_protocol_error() {
        let mut asm = Assembler::new(1 << 20);
        let err = asm
            .accept(frame(true, Opcode::Continuation, b"x"))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedContinuation));
    }

    #[test]
    fn control_frames_pass_through_with_a_partial_message_in_progress() {
        let mut asm = Assembler::new(1 << 20);
        asm.accept(frame(false, Opcode::Text, b"AB")).unwrap();

        match asm.accept(frame(true, Opcode::Ping, b"x")).unwrap() {
            AssemblerOutcome::Ping(data) => assert_eq!(data, b"x"),
            _ => panic!("expected a ping"),
        }

        match asm.accept(frame(true, Opcode::Continuation, b"CD")).unwrap() {
            AssemblerOutcome::Message { data, .. } => assert_eq!(data, b"ABCD"),
            _ => panic!("expected the data message to still reassemble"),
        }
    }

    #[test]
    fn oversized_message_fails_with_message_too_big() {
        let mut asm = Assembler::new(4);
        let err = asm
            .accept(frame(true, Opcode::Binary, b"hello"))
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooBig(5)));
    }

    #[test]
    fn oversized_fragmented_message_fails_on_the_overflowing_continuation() {
        let mut asm = Assembler::new(4);
        asm.accept(frame(false, Opcode::Binary, b"ab")).unwrap();
        let err = asm
            .accept(frame(true, Opcode::Continuation, b"abc"))
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooBig(5)));
    }

    #[test]
    fn pong_is_surfaced_for_the_driver_to_discard() {
        let mut asm = Assembler::new(1 << 20);
        match asm.accept(frame(true, Opcode::Pong, b"x")).unwrap() {
            AssemblerOutcome::Pong(data) => assert_eq!(data, b"x"),
            _ => panic!("expected a pong"),
        }
    }
}
