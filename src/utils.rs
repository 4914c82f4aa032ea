//! Small pure helpers shared by the handshake: the accept-key computation (RFC 6455 §1.3),
//! client key generation, and subprotocol negotiation.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::random;
use sha1::{Digest, Sha1};

pub(crate) const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

pub(crate) fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = random();
    BASE64_STANDARD.encode(random_bytes)
}

/// Parses a comma+space-separated `Sec-WebSocket-Protocol` header value into an ordered list
/// of offered/accepted names, per §4.5 step 3.
pub(crate) fn parse_subprotocol_list(header_value: &str) -> Vec<String> {
    header_value
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Picks the first subprotocol in `offered` (client preference order) that also appears in
/// `accepted` (server's allow-list, order-independent). Returns `None` if nothing matches, in
/// which case the connection still succeeds without a negotiated subprotocol.
pub(crate) fn negotiate_subprotocol(offered: &[String], accepted: &[String]) -> Option<String> {
    offered.iter().find(|name| accepted.contains(name)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc_6455_worked_example() {
        assert_eq!(
            generate_websocket_accept_value("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn generated_key_is_16_bytes_base64_encoded() {
        let key = generate_websocket_key();
        let decoded = base64::engine::general_purpose::STANDARD.decode(key).unwrap();
        assert_eq!(decoded.len(), 16);
    }

    #[test]
    fn subprotocol_list_splits_and_trims() {
        assert_eq!(
            parse_subprotocol_list("chat, superchat"),
            vec!["chat".to_string(), "superchat".to_string()]
        );
    }

    #[test]
    fn negotiation_picks_first_client_preference_that_the_server_accepts() {
        let offered = parse_subprotocol_list("chat, superchat");
        let accepted = vec!["superchat".to_string(), "chat".to_string()];
        assert_eq!(negotiate_subprotocol(&offered, &accepted), Some("chat".to_string()));
    }

    #[test]
    fn negotiation_returns_none_when_nothing_matches() {
        let offered = parse_subprotocol_list("foo, bar");
        let accepted = vec!["baz".to_string()];
        assert_eq!(negotiate_subprotocol(&offered, &accepted), None);
    }
}
