//! Error kinds, grouped the way §7 of the design groups them: protocol errors, handshake
//! errors, and the I/O/encoding errors that thread through `#[from]`.

use crate::frame::Opcode;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("invalid UTF-8 in text message or close reason: {source}")]
    InvalidUtf8 {
        #[from]
        source: FromUtf8Error,
    },

    #[error("could not parse WebSocket URL: {source}")]
    UrlParse {
        #[from]
        source: url::ParseError,
    },

    // Framing / protocol errors (§7 protocol_error)
    #[error("reserved RSV bit set without a negotiated extension")]
    ReservedBitsSet,

    #[error("unknown or reserved opcode: {0}")]
    InvalidOpcode(u8),

    #[error("control frames must not be fragmented")]
    ControlFrameFragmented,

    #[error("control frame payload exceeds 125 bytes")]
    ControlFramePayloadTooLarge,

    #[error("server received an unmasked frame")]
    UnmaskedFrameFromClient,

    #[error("client received a masked frame")]
    MaskedFrameFromServer,

    #[error("data frame received while a fragmented message is already in progress")]
    FragmentedMessageInProgress,

    #[error("continuation frame received with no fragmented message in progress")]
    UnexpectedContinuation,

    #[error("close frame carries an invalid close code: {0}")]
    InvalidCloseCode(u16),

    // Size errors (§7 message_too_big)
    #[error("frame payload of {0} bytes exceeds the configured max_frame_size")]
    FrameTooBig(usize),

    #[error("message of {0} bytes exceeds the configured max_message_size")]
    MessageTooBig(usize),

    // Handshake errors (§7 handshake_failed)
    #[error("handshake request is missing the Upgrade: websocket header")]
    MissingUpgradeHeader,

    #[error("handshake request is missing a Connection: Upgrade header")]
    MissingConnectionHeader,

    #[error("handshake request is missing Sec-WebSocket-Key")]
    MissingSecWebSocketKey,

    #[error("handshake request declared Sec-WebSocket-Version {0}, only \"13\" is supported")]
    UnsupportedVersion(String),

    #[error("malformed HTTP request line or headers during handshake")]
    MalformedHandshake,

    #[error("peer did not respond with HTTP 101 Switching Protocols")]
    NotUpgraded,

    #[error("Sec-WebSocket-Accept did not match the expected value")]
    InvalidAcceptKey,

    #[error("WebSocket URL must use the ws:// or wss:// scheme")]
    InvalidUrlScheme,

    #[error("WebSocket URL has no host")]
    UrlMissingHost,

    #[error("handshake did not complete within the configured timeout")]
    HandshakeTimeout,

    // Close-handshake errors (§7 unexpected_message)
    #[error("expected a close frame while draining the closing handshake, got: {0:?}")]
    UnexpectedMessage(Opcode),

    // Terminal state (§7 "stable, distinguishable error")
    #[error("the WebSocket endpoint is already closed")]
    EndpointClosed,

    #[error("message handler returned an error: {0}")]
    HandlerFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
