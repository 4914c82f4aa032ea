//! Connection Driver: binds a frame source/sink pair into a `WebSocket` endpoint, orchestrates
//! the closing handshake, and offers `split()` for independent reader/writer tasks.
//!
//! Grounded on the teacher's `read.rs` (`poll_messages`, the side-effecting glue that the
//! `Assembler` in this crate deliberately doesn't do itself) and `split.rs`/`event.rs` (the
//! background-task-forwards-to-channel shape for `split()`). The multi-connection accept-loop
//! dispatch in the teacher's `server.rs`/`event.rs` is out of scope per spec §1 and is not
//! reused here.

use crate::assembler::{Assembler, AssemblerOutcome};
use crate::config::{ClientOptions, Mode, ServerOptions, WebSocketConfig};
use crate::error::{Error, Result};
use crate::frame::{read_frame, Opcode, ReadOutcome};
use crate::handshake::{perform_client_handshake, perform_server_handshake};
use crate::message::{is_valid_close_code, Message};
use crate::sender::{Sender, SharedSender};
use futures::{FutureExt, Stream};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

/// How many non-close frames `close()` tolerates while draining before giving up on the peer
/// ever sending one, per the bound called out in spec §4.6/§5.
const MAX_DRAIN_FRAMES: usize = 16;

/// The four states an endpoint passes through exactly once, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointState {
    Open,
    SentClose,
    ReceivedClose,
    Closed,
}

/// A WebSocket endpoint: a frame source (`reader`) and sink (`sender`) bound together with
/// the Message Assembler and the close-handshake state machine. Safe to own by one reader and
/// one writer task concurrently (see `split()`).
pub struct WebSocket<S> {
    reader: BufReader<ReadHalf<S>>,
    sender: SharedSender<WriteHalf<S>>,
    assembler: Assembler,
    mode: Mode,
    subprotocol: Option<String>,
    config: WebSocketConfig,
    close_parent: bool,
    state: EndpointState,
}

impl<S> WebSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Server side of the handshake (§4.5): validates the upgrade request on `stream`,
    /// negotiates a subprotocol, and responds 101 before returning the bound endpoint.
    pub async fn accept(stream: S, options: ServerOptions) -> Result<Self> {
        let outcome = perform_server_handshake(stream, &options).await?;
        Ok(Self {
            reader: outcome.reader,
            sender: Arc::new(Mutex::new(Sender::new(
                outcome.writer,
                Mode::Server,
                options.buffer_size,
            ))),
            assembler: Assembler::new(options.config.max_message_size),
            mode: Mode::Server,
            subprotocol: outcome.subprotocol,
            config: options.config,
            close_parent: options.close_parent,
            state: EndpointState::Open,
        })
    }

    /// Client side of the handshake (§4.5): sends the GET upgrade request over `stream` for
    /// `url` (used only to build the `Host`/path, not to dial — TCP/TLS/DNS are the caller's
    /// job per spec §1) and verifies the server's accept key.
    pub async fn connect(stream: S, url: &str, options: ClientOptions) -> Result<Self> {
        let outcome = perform_client_handshake(stream, url, &options).await?;
        Ok(Self {
            reader: outcome.reader,
            sender: Arc::new(Mutex::new(Sender::new(
                outcome.writer,
                Mode::Client,
                options.buffer_size,
            ))),
            assembler: Assembler::new(options.config.max_message_size),
            mode: Mode::Client,
            subprotocol: outcome.subprotocol,
            config: options.config,
            close_parent: options.close_parent,
            state: EndpointState::Open,
        })
    }

    /// Accepts the upgrade, then runs `handler` to completion, honoring
    /// `ServerOptions::guarded` (§4.5 server step 6): when `true` (the default), the handler is
    /// wrapped with [`WebSocket::guard`] so normal/error/panic completion all drive a close;
    /// when `false`, the handler is invoked bare and the caller is responsible for closing.
    pub async fn serve<F, Fut, T, E>(stream: S, options: ServerOptions, handler: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let guarded = options.guarded;
        let mut ws = Self::accept(stream, options).await?;
        if guarded {
            ws.guard(handler).await
        } else {
            handler(&mut ws)
                .await
                .map_err(|err| Error::HandlerFailed(err.to_string()))
        }
    }

    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.state == EndpointState::Closed
    }

    /// Reads, assembles, and returns the next application message, transparently answering
    /// pings with pongs and discarding pongs along the way (§4.3). Returns
    /// `Message::Close{code: 1006, ..}` if the stream ends without a close frame ever arriving.
    pub async fn receive(&mut self) -> Result<Message> {
        if self.state == EndpointState::Closed {
            return Err(Error::EndpointClosed);
        }
        loop {
            match read_frame(&mut self.reader, self.mode, &self.config).await {
                Ok(ReadOutcome::Eof) => {
                    self.state = EndpointState::Closed;
                    return Ok(Message::Close {
                        code: 1006,
                        reason: "stream closed without a close frame".to_string(),
                    });
                }
                Ok(ReadOutcome::Frame(frame)) => match self.assembler.accept(frame) {
                    Ok(outcome) => {
                        if let Some(message) = self.handle_outcome(outcome).await? {
                            return Ok(message);
                        }
                    }
                    Err(err) => return Err(self.fail(err).await),
                },
                Err(err) => return Err(self.fail(err).await),
            }
        }
    }

    /// Turns one `AssemblerOutcome` into `Some(message)` to deliver to the caller, or `None`
    /// to keep reading (control frames the caller never sees).
    async fn handle_outcome(&mut self, outcome: AssemblerOutcome) -> Result<Option<Message>> {
        match outcome {
            AssemblerOutcome::Pending => Ok(None),
            AssemblerOutcome::Pong(_) => Ok(None),
            AssemblerOutcome::Ping(data) => {
                let mut sender = self.sender.lock().await;
                match sender.send_pong(data.clone()).await {
                    Ok(()) => Ok(None),
                    Err(_) => Ok(Some(Message::Ping(data))),
                }
            }
            AssemblerOutcome::Message {
                opcode: Opcode::Text,
                data,
            } => match String::from_utf8(data) {
                Ok(text) => Ok(Some(Message::Text(text))),
                Err(err) => Err(self.fail(Error::from(err)).await),
            },
            AssemblerOutcome::Message {
                opcode: Opcode::Binary,
                data,
            } => Ok(Some(Message::Binary(data))),
            AssemblerOutcome::Message { .. } => {
                unreachable!("Assembler only ever yields Text/Binary data messages")
            }
            AssemblerOutcome::Close(payload) => self.handle_close_frame(payload).await,
        }
    }

    async fn handle_close_frame(&mut self, payload: Vec<u8>) -> Result<Option<Message>> {
        let (code, reason) = match decode_close_payload(payload) {
            Ok(parsed) => parsed,
            Err(err) => return Err(self.fail(err).await),
        };

        let was_open = self.state == EndpointState::Open;
        self.state = EndpointState::ReceivedClose;
        if was_open {
            let echo_code = code.unwrap_or(1000);
            let mut sender = self.sender.lock().await;
            let _ = sender.send_close(echo_code, String::new()).await;
            self.state = EndpointState::Closed;
        }

        Ok(Some(Message::Close {
            code: code.unwrap_or(1000),
            reason,
        }))
    }

    /// Maps a failure to its §7 close code, best-effort-sends that close frame (skipped for
    /// I/O errors, since the stream is presumably already broken), marks the endpoint Closed,
    /// and returns the original error for the caller to propagate.
    async fn fail(&mut self, err: Error) -> Error {
        if let Some(code) = close_code_for(&err) {
            let mut sender = self.sender.lock().await;
            let _ = sender.send_close(code, err.to_string()).await;
        }
        self.state = EndpointState::Closed;
        err
    }

    /// Sends any application message (§4.4). `Message::Close` is accepted here too, so a
    /// caller that already has a `Message` in hand (e.g. echoing one back) doesn't need to
    /// destructure it first; prefer [`WebSocket::close`] to drive the full closing handshake.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        if matches!(self.state, EndpointState::SentClose | EndpointState::Closed) {
            return Err(Error::EndpointClosed);
        }
        let mut sender = self.sender.lock().await;
        sender.send(message).await
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.send(Message::Text(text.into())).await
    }

    pub async fn send_binary(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Binary(data)).await
    }

    pub async fn send_ping(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Ping(data)).await
    }

    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Pong(data)).await
    }

    /// Drives the symmetric closing handshake (§4.6): sends `close(code, reason)` unless
    /// already sent, then drains incoming frames until the peer's close arrives. Idempotent —
    /// calling this on an already-`Closed` endpoint is a no-op.
    pub async fn close(&mut self, code: u16, reason: impl Into<String>) -> Result<()> {
        if self.state == EndpointState::Closed {
            return Ok(());
        }

        if self.state != EndpointState::SentClose {
            let mut sender = self.sender.lock().await;
            sender.send_close(code, reason.into()).await?;
            self.state = if self.state == EndpointState::ReceivedClose {
                EndpointState::Closed
            } else {
                EndpointState::SentClose
            };
        }

        if self.state != EndpointState::Closed {
            self.drain_until_close().await?;
        }

        if self.close_parent {
            let mut sender = self.sender.lock().await;
            let _ = sender.shutdown().await;
        }

        Ok(())
    }

    async fn drain_until_close(&mut self) -> Result<()> {
        for _ in 0..MAX_DRAIN_FRAMES {
            match read_frame(&mut self.reader, self.mode, &self.config).await {
                Ok(ReadOutcome::Frame(frame)) if frame.opcode == Opcode::Close => {
                    self.state = EndpointState::Closed;
                    return Ok(());
                }
                Ok(ReadOutcome::Frame(_)) => continue,
                Ok(ReadOutcome::Eof) => {
                    self.state = EndpointState::Closed;
                    return Ok(());
                }
                Err(err) => return Err(self.fail(err).await),
            }
        }
        Err(self.fail(Error::UnexpectedMessage(Opcode::Continuation)).await)
    }

    /// Runs `handler` to completion, then closes the endpoint per the outcome: normal return
    /// → `close(1000, "bye")`; `Err` return → `close(1011, <message>)`; panic → `close(1011,
    /// "goal failed")` before resuming the unwind. Mirrors the teacher's "handler guarded by
    /// catch-all" pattern (§9), made explicit instead of embedded in the accept-loop.
    pub async fn guard<F, Fut, T, E>(&mut self, handler: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match AssertUnwindSafe(handler(self)).catch_unwind().await {
            Ok(Ok(value)) => {
                let _ = self.close(1000, "bye").await;
                Ok(value)
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                let _ = self.close(1011, message.clone()).await;
                Err(Error::HandlerFailed(message))
            }
            Err(panic_payload) => {
                let _ = self.close(1011, "goal failed").await;
                std::panic::resume_unwind(panic_payload)
            }
        }
    }

    /// Splits the endpoint into an independently pollable `WebSocketReader` (a
    /// `futures::Stream`) and a cloneable `WebSocketWriter`, so a read loop and concurrent
    /// writers can live in separate tasks. A background task drives `receive()` and forwards
    /// results into a channel, ending the stream after the first close/error.
    pub fn split(self) -> (WebSocketReader, WebSocketWriter<S>)
    where
        S: Send + 'static,
    {
        let sender = self.sender.clone();
        let mut driver = self;
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            loop {
                match driver.receive().await {
                    Ok(message) => {
                        let is_terminal = matches!(message, Message::Close { .. });
                        if tx.send(Ok(message)).await.is_err() || is_terminal {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        break;
                    }
                }
            }
        });

        (
            WebSocketReader::new(ReceiverStream::new(rx)),
            WebSocketWriter::new(sender),
        )
    }
}

/// Decodes a close frame's payload per spec §3/§4.3: an empty payload carries no status (the
/// caller-facing message still synthesizes code 1000, per §6); otherwise the first two bytes
/// are a big-endian close code, followed by a UTF-8 reason.
fn decode_close_payload(payload: Vec<u8>) -> Result<(Option<u16>, String)> {
    if payload.is_empty() {
        return Ok((None, String::new()));
    }
    if payload.len() == 1 {
        return Err(Error::InvalidCloseCode(0));
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    if !is_valid_close_code(code) {
        return Err(Error::InvalidCloseCode(code));
    }
    let reason = String::from_utf8(payload[2..].to_vec())?;
    Ok((Some(code), reason))
}

/// Maps an error to the close code that should accompany it per §7, or `None` when the
/// failure means the stream itself is unusable and no close frame should be attempted.
fn close_code_for(err: &Error) -> Option<u16> {
    match err {
        Error::Io { .. } => None,
        Error::InvalidUtf8 { .. } => Some(1007),
        Error::FrameTooBig(_) | Error::MessageTooBig(_) => Some(1009),
        _ => Some(1002),
    }
}

/// A `futures::Stream` of incoming messages, produced by `WebSocket::split()`.
pub struct WebSocketReader {
    inner: ReceiverStream<Result<Message>>,
}

impl WebSocketReader {
    fn new(inner: ReceiverStream<Result<Message>>) -> Self {
        Self { inner }
    }
}

impl Stream for WebSocketReader {
    type Item = Result<Message>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

/// A cloneable message-level writer, produced by `WebSocket::split()`. Every clone shares the
/// same per-endpoint write lock, so concurrent `send_*` calls from different clones still
/// serialize at message granularity (§4.4).
pub struct WebSocketWriter<S> {
    sender: SharedSender<WriteHalf<S>>,
}

impl<S> Clone for WebSocketWriter<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> WebSocketWriter<S>
where
    S: AsyncWrite + Unpin,
{
    fn new(sender: SharedSender<WriteHalf<S>>) -> Self {
        Self { sender }
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.sender.lock().await.send_text(text.into()).await
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<()> {
        self.sender.lock().await.send_binary(data).await
    }

    pub async fn send_ping(&self, data: Vec<u8>) -> Result<()> {
        self.sender.lock().await.send_ping(data).await
    }

    pub async fn send_pong(&self, data: Vec<u8>) -> Result<()> {
        self.sender.lock().await.send_pong(data).await
    }
}
