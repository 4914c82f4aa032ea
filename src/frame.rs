//! Frame Codec: the on-wire unit defined in RFC 6455 §5.2, plus the read/write operations
//! that turn it into and out of bytes on an arbitrary async byte stream.

use crate::config::{Mode, WebSocketConfig};
use crate::error::{Error, Result};
use crate::masker::apply_mask;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How many bytes of a payload are masked/written per chunk, so `write_frame` never holds a
/// second full-length copy of a large payload in memory.
const SCRATCH_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        match byte & 0x0F {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(Error::InvalidOpcode(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(fin: bool, opcode: Opcode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload,
        }
    }

    pub(crate) fn is_control(&self) -> bool {
        self.opcode.is_control()
    }
}

/// Result of trying to read one frame: either a frame, or a clean end of stream (no bytes
/// read at all — a stream ending mid-header is instead an `Error::Io` with `UnexpectedEof`).
pub(crate) enum ReadOutcome {
    Frame(Frame),
    Eof,
}

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    mode: Mode,
    config: &WebSocketConfig,
) -> Result<ReadOutcome> {
    let mut byte0 = [0u8; 1];
    if reader.read(&mut byte0).await? == 0 {
        return Ok(ReadOutcome::Eof);
    }
    let mut byte1 = [0u8; 1];
    reader.read_exact(&mut byte1).await?;
    let byte0 = byte0[0];
    let byte1 = byte1[0];

    let fin = byte0 & 0b1000_0000 != 0;
    let rsv1 = byte0 & 0b0100_0000 != 0;
    let rsv2 = byte0 & 0b0010_0000 != 0;
    let rsv3 = byte0 & 0b0001_0000 != 0;
    let opcode = Opcode::try_from(byte0 & 0b0000_1111)?;

    if !config.allow_unmasked_rsv && (rsv1 || rsv2 || rsv3) {
        return Err(Error::ReservedBitsSet);
    }

    if !fin && opcode.is_control() {
        return Err(Error::ControlFrameFragmented);
    }

    let masked = byte1 & 0b1000_0000 != 0;
    let len7 = byte1 & 0b0111_1111;

    if len7 > 125 && opcode.is_control() {
        return Err(Error::ControlFramePayloadTooLarge);
    }

    let len: usize = if len7 == 126 {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;
        u16::from_be_bytes(buf) as usize
    } else if len7 == 127 {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).await?;
        let len64 = u64::from_be_bytes(buf);
        // RFC 6455 §5.2: the high bit of the 64-bit length MUST be zero. A value that large
        // will also blow past any sane max_frame_size, so treating it as message-too-big
        // rather than adding a dedicated error variant is both correct and simpler.
        usize::try_from(len64).map_err(|_| Error::FrameTooBig(usize::MAX))?
    } else {
        len7 as usize
    };

    match mode {
        Mode::Server if !masked => return Err(Error::UnmaskedFrameFromClient),
        Mode::Client if masked => return Err(Error::MaskedFrameFromServer),
        _ => {}
    }

    if len > config.max_frame_size {
        return Err(Error::FrameTooBig(len));
    }

    let mask_key = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    if let Some(key) = mask_key {
        apply_mask(&mut payload, key, 0);
    }

    Ok(ReadOutcome::Frame(Frame {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        payload,
    }))
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    mode: Mode,
) -> Result<()> {
    let mut byte0 = (frame.fin as u8) << 7 | frame.opcode.as_u8();
    if frame.rsv1 {
        byte0 |= 0b0100_0000;
    }
    if frame.rsv2 {
        byte0 |= 0b0010_0000;
    }
    if frame.rsv3 {
        byte0 |= 0b0001_0000;
    }
    writer.write_all(&[byte0]).await?;

    let mask_bit = if mode == Mode::Client { 0x80 } else { 0x00 };
    let len = frame.payload.len();

    if len <= 125 {
        writer.write_all(&[mask_bit | len as u8]).await?;
    } else if len <= u16::MAX as usize {
        let len_bytes = (len as u16).to_be_bytes();
        writer
            .write_all(&[mask_bit | 126, len_bytes[0], len_bytes[1]])
            .await?;
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let mut header = [0u8; 9];
        header[0] = mask_bit | 127;
        header[1..].copy_from_slice(&len_bytes);
        writer.write_all(&header).await?;
    }

    match mode {
        Mode::Client => {
            let key: [u8; 4] = rand::rng().random();
            writer.write_all(&key).await?;
            write_masked(writer, &frame.payload, key).await?;
        }
        Mode::Server => {
            writer.write_all(&frame.payload).await?;
        }
    }

    Ok(())
}

/// Masks and writes `payload` in `SCRATCH_SIZE` chunks instead of allocating a second
/// full-length copy, per §4.2's "MUST not buffer an entire payload on send".
async fn write_masked<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    key: [u8; 4],
) -> Result<()> {
    let mut scratch = [0u8; SCRATCH_SIZE];
    let mut offset = 0;
    for chunk in payload.chunks(SCRATCH_SIZE) {
        let buf = &mut scratch[..chunk.len()];
        buf.copy_from_slice(chunk);
        apply_mask(buf, key, offset);
        writer.write_all(buf).await?;
        offset += chunk.len();
    }
    Ok(())
}
