//! Endpoint configuration: frame/message size limits, the RSV strictness knob, and the
//! options bags accepted by `WebSocket::accept`/`WebSocket::connect`.

use std::time::Duration;

/// Which side of the handshake an endpoint plays. Determines masking direction: client
/// frames are always masked on the wire, server frames never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Client,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub max_frame_size: usize,
    pub max_message_size: usize,
    /// Non-strict opt-in: when true, a non-zero RSV bit on a received frame is passed through
    /// to the application instead of failing the connection. Defaults to `false`, per the
    /// redesign flag: the RFC requires failing the connection absent a negotiated extension,
    /// and this crate negotiates none.
    pub allow_unmasked_rsv: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            allow_unmasked_rsv: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub config: WebSocketConfig,
    /// Subprotocols this server is willing to speak, in no particular order — the client's
    /// preference order (§4.5 step 3) is what decides the winner among these.
    pub subprotocols: Vec<String>,
    /// Fragment threshold for outgoing data messages. `None` never fragments on send.
    pub buffer_size: Option<usize>,
    /// Whether the wrapped stream is closed when the endpoint is dropped/closed.
    pub close_parent: bool,
    /// Whether `WebSocket::guard` is used to wrap the handler with an automatic close.
    pub guarded: bool,
    pub handshake_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            config: WebSocketConfig::default(),
            subprotocols: Vec::new(),
            buffer_size: None,
            close_parent: true,
            guarded: true,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub config: WebSocketConfig,
    /// Subprotocols offered to the server, in client preference order (§4.5 client step 1).
    pub subprotocols: Vec<String>,
    /// Fragment threshold for outgoing data messages. `None` never fragments on send.
    pub buffer_size: Option<usize>,
    pub close_parent: bool,
    pub handshake_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            config: WebSocketConfig::default(),
            subprotocols: Vec::new(),
            buffer_size: None,
            close_parent: true,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
