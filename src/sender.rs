//! Sender: serializes application messages into frames and writes them to the underlying
//! stream, with a per-endpoint write lock held across whole messages (§4.4), not per-frame —
//! grounded on the teacher's `write.rs`/`split.rs` writer split, generalized so the lock lives
//! one level up (`Arc<Mutex<Sender<W>>>`) instead of wrapping a raw `Writer`.

use crate::config::Mode;
use crate::error::Result;
use crate::frame::write_frame;
use crate::message::Message;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

/// Message-level API over an `AsyncWrite` half: owns the mode (client frames are masked,
/// server frames are not) and the optional fragmentation threshold.
pub(crate) struct Sender<W> {
    writer: W,
    mode: Mode,
    buffer_size: Option<usize>,
}

impl<W: AsyncWrite + Unpin> Sender<W> {
    pub(crate) fn new(writer: W, mode: Mode, buffer_size: Option<usize>) -> Self {
        Self {
            writer,
            mode,
            buffer_size,
        }
    }

    /// Writes every frame of one message back to back. Concurrent `send` calls are kept from
    /// interleaving by wrapping the `Sender` itself in `Arc<tokio::sync::Mutex<_>>` and holding
    /// the guard for the whole call, which is exactly what this method's `&mut self` receiver
    /// requires of its caller.
    pub(crate) async fn send(&mut self, message: Message) -> Result<()> {
        for frame in message.into_frames(self.buffer_size) {
            write_frame(&mut self.writer, &frame, self.mode).await?;
        }
        Ok(())
    }

    pub(crate) async fn send_text(&mut self, text: String) -> Result<()> {
        self.send(Message::Text(text)).await
    }

    pub(crate) async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Binary(data)).await
    }

    pub(crate) async fn send_ping(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Ping(data)).await
    }

    pub(crate) async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Pong(data)).await
    }

    pub(crate) async fn send_close(&mut self, code: u16, reason: String) -> Result<()> {
        self.send(Message::Close { code, reason }).await
    }

    /// Shuts down the write half, used when `close_parent` is set once the closing handshake
    /// has finished on both sides.
    pub(crate) async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.writer).await?;
        Ok(())
    }
}

/// Convenience alias for the `Arc<Mutex<_>>` shape every concurrent writer clones, matching
/// the teacher's `Arc<Mutex<Writer>>` pattern in `split.rs`/`event.rs`.
pub(crate) type SharedSender<W> = Arc<Mutex<Sender<W>>>;
