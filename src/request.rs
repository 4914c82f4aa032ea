//! Minimal HTTP request/response reading for the upgrade handshake only — not a general
//! HTTP/1.1 parser. Grounded on the teacher's `request.rs` (`HttpRequest::parse_http_request`,
//! `construct_http_request`): same read-line-until-blank-line shape, same bound on how much
//! header data is read before giving up, generalized here to also produce the client-side
//! status-line reader the teacher never had (its `handshake.rs` read raw bytes by scanning for
//! a literal `Sec-WebSocket-Key:` substring instead of parsing headers structurally).

use crate::error::{Error, Result};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::time::{timeout, Duration};

/// Cap on how much header data we'll read before giving up — a client that never sends a
/// blank line shouldn't be able to hold a handshake reader open indefinitely.
const MAX_HEADER_BYTES: usize = 16 * 1024;

/// A parsed HTTP request line + headers, as read off the wire during the server-side upgrade.
pub(crate) struct HandshakeRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    pub(crate) async fn read<R: AsyncReadExt + Unpin>(
        reader: &mut BufReader<R>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let raw = read_header_block(reader, read_timeout).await?;
        let mut lines = raw.lines();
        let request_line = lines.next().ok_or(Error::MalformedHandshake)?;
        let mut parts = request_line.split_whitespace();
        let method = parts.next().ok_or(Error::MalformedHandshake)?.to_string();
        let path = parts.next().ok_or(Error::MalformedHandshake)?.to_string();
        parts.next().ok_or(Error::MalformedHandshake)?; // HTTP version, unused

        Ok(Self {
            method,
            path,
            headers: parse_headers(lines),
        })
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The client-side counterpart: a parsed HTTP status line + headers, read from the server's
/// response to the upgrade request.
pub(crate) struct HandshakeResponse {
    pub(crate) status_code: u16,
    headers: HashMap<String, String>,
}

impl HandshakeResponse {
    pub(crate) async fn read<R: AsyncReadExt + Unpin>(
        reader: &mut BufReader<R>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let raw = read_header_block(reader, read_timeout).await?;
        let mut lines = raw.lines();
        let status_line = lines.next().ok_or(Error::MalformedHandshake)?;
        let status_code = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or(Error::MalformedHandshake)?;

        Ok(Self {
            status_code,
            headers: parse_headers(lines),
        })
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

/// Reads lines until the blank line that ends an HTTP header block, bounded by both a byte
/// count and a wall-clock timeout — the handshake phase is the one place in this crate that
/// imposes its own timeout (§5), since an unupgraded connection left open is a resource risk
/// the crate can reasonably guard against on its own.
async fn read_header_block<R: AsyncReadExt + Unpin>(
    reader: &mut BufReader<R>,
    read_timeout: Duration,
) -> Result<String> {
    let mut buffer = String::new();
    timeout(read_timeout, async {
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 || buffer.len() + line.len() > MAX_HEADER_BYTES {
                break;
            }
            let blank = line == "\r\n" || line == "\n";
            buffer.push_str(&line);
            if blank {
                break;
            }
        }
        Ok::<(), Error>(())
    })
    .await
    .map_err(|_| Error::HandshakeTimeout)??;

    if buffer.is_empty() {
        return Err(Error::MalformedHandshake);
    }
    Ok(buffer)
}

/// Checks a `Connection` header for the `upgrade` token, comma-split and case-insensitive per
/// §4.5 step 1.
pub(crate) fn connection_header_has_upgrade(value: &str) -> bool {
    value
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}

/// Builds the bytes of the client's GET upgrade request (§4.5 client step 1).
pub(crate) fn build_request(
    host: &str,
    path: &str,
    key: &str,
    subprotocols: &[String],
) -> String {
    let mut request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Keep-alive, Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n"
    );
    if !subprotocols.is_empty() {
        request.push_str(&format!(
            "Sec-WebSocket-Protocol: {}\r\n",
            subprotocols.join(", ")
        ));
    }
    request.push_str("\r\n");
    request
}

/// Builds the bytes of the server's 101 Switching Protocols response (§4.5 server step 5).
pub(crate) fn build_101_response(accept_key: &str, subprotocol: Option<&str>) -> String {
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept_key}\r\n"
    );
    if let Some(subprotocol) = subprotocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {subprotocol}\r\n"));
    }
    response.push_str("\r\n");
    response
}

/// Builds a bare HTTP 400 response for a version mismatch, per §4.5 server step 3. This crate
/// does not own general HTTP response writing, so this is offered only as a convenience for
/// callers that want to respond before dropping the connection.
pub(crate) fn build_400_version_mismatch_response() -> String {
    "HTTP/1.1 400 Bad Request\r\nSec-WebSocket-Version: 13\r\nContent-Length: 0\r\n\r\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_request_line_and_headers() {
        let raw = "GET /chat HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\nSec-WebSocket-Key: abc\r\n\r\n";
        let mut reader = BufReader::new(std::io::Cursor::new(raw.as_bytes()));
        let request = HandshakeRequest::read(&mut reader, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/chat");
        assert_eq!(request.header("host"), Some("example.com"));
        assert_eq!(request.header("Upgrade"), Some("websocket"));
        assert_eq!(request.header("sec-websocket-key"), Some("abc"));
    }

    #[tokio::test]
    async fn reads_status_line_and_headers() {
        let raw = "HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-Accept: xyz\r\n\r\n";
        let mut reader = BufReader::new(std::io::Cursor::new(raw.as_bytes()));
        let response = HandshakeResponse::read(&mut reader, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.status_code, 101);
        assert_eq!(response.header("sec-websocket-accept"), Some("xyz"));
    }

    #[test]
    fn connection_header_matches_upgrade_case_insensitively_among_tokens() {
        assert!(connection_header_has_upgrade("Keep-Alive, Upgrade"));
        assert!(connection_header_has_upgrade("upgrade"));
        assert!(!connection_header_has_upgrade("keep-alive"));
    }

    #[tokio::test]
    async fn empty_stream_is_a_malformed_handshake() {
        let mut reader = BufReader::new(std::io::Cursor::new(Vec::<u8>::new()));
        let err = HandshakeRequest::read(&mut reader, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedHandshake));
    }
}
