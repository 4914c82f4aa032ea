//! Simple async WebSockets implementation for Tokio stack.
//!
//! This library offers a minimal, standards-faithful implementation of the
//! [WebSocket Protocol RFC 6455](https://datatracker.ietf.org/doc/html/rfc6455), so an end user
//! can wrap a WebSocket server or client into their application without pulling in a large
//! HTTP framework. It performs the opening handshake, reads and writes frames, reassembles
//! fragmented messages, and drives the closing handshake — all on top of any
//! `AsyncRead + AsyncWrite` stream the caller hands it (a `tokio::net::TcpStream`, a TLS
//! stream, or an in-memory pipe for tests).
//!
//! Dialing, listening, and TLS are deliberately left to the caller: this crate starts from an
//! already-connected stream, not a socket address.

mod assembler;
pub mod config;
mod connection;
pub mod error;
pub mod frame;
mod handshake;
mod masker;
pub mod message;
mod request;
mod sender;
mod utils;

pub use config::{ClientOptions, Mode, ServerOptions, WebSocketConfig};
pub use connection::{WebSocket, WebSocketReader, WebSocketWriter};
pub use error::{Error, Result};
pub use message::Message;
