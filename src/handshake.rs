//! Handshake: server-side upgrade validation + negotiation, and client-side request/verify.
//! Grounded on the teacher's `request.rs` (`construct_http_request`, `HttpRequest::parse_http_request`)
//! for the reader/writer shape; the teacher's separate `handshake.rs` (a `perform_handshake`
//! free function that scanned raw bytes for a literal `Sec-WebSocket-Key:` substring) is not
//! reused directly since `request.rs`'s structured header map already does that job and also
//! reads `Connection`/`Upgrade`/`Sec-WebSocket-Version`/`Sec-WebSocket-Protocol`, which the
//! teacher's ad hoc scanner never did at all.

use crate::config::{ClientOptions, ServerOptions};
use crate::error::{Error, Result};
use crate::request::{
    build_101_response, build_request, connection_header_has_upgrade, HandshakeRequest,
    HandshakeResponse,
};
use crate::utils::{
    generate_websocket_accept_value, generate_websocket_key, negotiate_subprotocol,
    parse_subprotocol_list,
};
use log::{debug, warn};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use url::Url;

pub(crate) struct ServerHandshakeOutcome<S> {
    pub(crate) reader: BufReader<ReadHalf<S>>,
    pub(crate) writer: WriteHalf<S>,
    pub(crate) subprotocol: Option<String>,
}

/// Server side of §4.5: validates the upgrade request, negotiates a subprotocol, and writes
/// the 101 response. On any handshake failure, nothing is written back except where the
/// caller separately chooses to call [`crate::request::build_400_version_mismatch_response`].
pub(crate) async fn perform_server_handshake<S>(
    stream: S,
    options: &ServerOptions,
) -> Result<ServerHandshakeOutcome<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = split(stream);
    let mut reader = BufReader::new(read_half);
    let request = HandshakeRequest::read(&mut reader, options.handshake_timeout).await?;

    let upgrade = request.header("upgrade").ok_or(Error::MissingUpgradeHeader)?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::MissingUpgradeHeader);
    }

    let connection = request
        .header("connection")
        .ok_or(Error::MissingConnectionHeader)?;
    if !connection_header_has_upgrade(connection) {
        return Err(Error::MissingConnectionHeader);
    }

    let key = request
        .header("sec-websocket-key")
        .ok_or(Error::MissingSecWebSocketKey)?
        .to_string();

    let version = request.header("sec-websocket-version").unwrap_or("").to_string();
    if version != "13" {
        warn!("rejecting handshake with unsupported Sec-WebSocket-Version: {version}");
        return Err(Error::UnsupportedVersion(version));
    }

    let offered = request
        .header("sec-websocket-protocol")
        .map(parse_subprotocol_list)
        .unwrap_or_default();
    let subprotocol = negotiate_subprotocol(&offered, &options.subprotocols);

    let accept_key = generate_websocket_accept_value(&key);
    let response = build_101_response(&accept_key, subprotocol.as_deref());
    write_half.write_all(response.as_bytes()).await?;
    debug!("server handshake complete, subprotocol={subprotocol:?}");

    Ok(ServerHandshakeOutcome {
        reader,
        writer: write_half,
        subprotocol,
    })
}

pub(crate) struct ClientHandshakeOutcome<S> {
    pub(crate) reader: BufReader<ReadHalf<S>>,
    pub(crate) writer: WriteHalf<S>,
    pub(crate) subprotocol: Option<String>,
}

/// Client side of §4.5: sends the GET upgrade request, then verifies the 101 response's
/// `Sec-WebSocket-Accept` against the expected value computed from the key this call itself
/// generated.
pub(crate) async fn perform_client_handshake<S>(
    stream: S,
    url: &str,
    options: &ClientOptions,
) -> Result<ClientHandshakeOutcome<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let parsed = Url::parse(url)?;
    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
        return Err(Error::InvalidUrlScheme);
    }
    let host = parsed.host_str().ok_or(Error::UrlMissingHost)?;
    let host_header = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = match parsed.query() {
        Some(query) => format!("{}?{}", parsed.path(), query),
        None => parsed.path().to_string(),
    };

    let key = generate_websocket_key();
    let request = build_request(&host_header, &path, &key, &options.subprotocols);

    let (read_half, mut write_half) = split(stream);
    write_half.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(read_half);
    let response = HandshakeResponse::read(&mut reader, options.handshake_timeout).await?;
    if response.status_code != 101 {
        return Err(Error::NotUpgraded);
    }

    let accept = response
        .header("sec-websocket-accept")
        .ok_or(Error::InvalidAcceptKey)?;
    if accept != generate_websocket_accept_value(&key) {
        return Err(Error::InvalidAcceptKey);
    }

    let subprotocol = response
        .header("sec-websocket-protocol")
        .map(|s| s.to_string());
    debug!("client handshake complete, subprotocol={subprotocol:?}");

    Ok(ClientHandshakeOutcome {
        reader,
        writer: write_half,
        subprotocol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerOptions;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn server_handshake_negotiates_first_client_preference_that_server_accepts() {
        let (client, server) = duplex(4096);
        let mut options = ServerOptions::default();
        options.subprotocols = vec!["superchat".to_string(), "chat".to_string()];
        options.handshake_timeout = Duration::from_secs(1);

        let server_task = tokio::spawn(async move { perform_server_handshake(server, &options).await });

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(
                b"GET / HTTP/1.1\r\nHost: x\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
                  Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\
                  Sec-WebSocket-Protocol: chat, superchat\r\n\r\n",
            )
            .await
            .unwrap();

        let mut response = Vec::new();
        let mut buf = [0u8; 1024];
        let n = client_read.read(&mut buf).await.unwrap();
        response.extend_from_slice(&buf[..n]);
        let response = String::from_utf8(response).unwrap();
        assert!(response.contains("101 Switching Protocols"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(response.contains("Sec-WebSocket-Protocol: chat"));

        let outcome = server_task.await.unwrap().unwrap();
        assert_eq!(outcome.subprotocol, Some("chat".to_string()));
    }

    #[tokio::test]
    async fn server_handshake_rejects_missing_upgrade_header() {
        let (client, server) = duplex(4096);
        let mut options = ServerOptions::default();
        options.handshake_timeout = Duration::from_secs(1);

        let server_task = tokio::spawn(async move { perform_server_handshake(server, &options).await });

        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: Upgrade\r\n\r\n")
            .await
            .unwrap();

        let err = server_task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::MissingUpgradeHeader));
    }
}
