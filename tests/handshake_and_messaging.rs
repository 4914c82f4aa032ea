//! End-to-end scenarios (spec §8): full client/server round trips over an in-memory duplex
//! stream, driven entirely through the public API — no internal module access, matching how a
//! real caller would exercise this crate.

use socket_flow::{ClientOptions, Message, ServerOptions, WebSocket};
use tokio::io::duplex;

#[tokio::test]
async fn echo_handshake_negotiates_the_first_client_preference_the_server_accepts() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let mut server_options = ServerOptions::default();
    server_options.subprotocols = vec!["superchat".to_string(), "chat".to_string()];
    let server_task = tokio::spawn(async move {
        WebSocket::accept(server_stream, server_options).await.unwrap()
    });

    let mut client_options = ClientOptions::default();
    client_options.subprotocols = vec!["chat".to_string(), "superchat".to_string()];
    let client = WebSocket::connect(client_stream, "ws://localhost/chat", client_options)
        .await
        .unwrap();
    let server = server_task.await.unwrap();

    assert_eq!(client.subprotocol(), Some("chat"));
    assert_eq!(server.subprotocol(), Some("chat"));
}

#[tokio::test]
async fn text_message_echoes_unchanged() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        let message = server.receive().await.unwrap();
        server.send(message).await.unwrap();
    });

    let mut client = WebSocket::connect(client_stream, "ws://localhost/", ClientOptions::default())
        .await
        .unwrap();
    client.send_text("Hello World!").await.unwrap();
    let received = client.receive().await.unwrap();

    server_task.await.unwrap();
    assert_eq!(received, Message::Text("Hello World!".to_string()));
}

#[tokio::test]
async fn fragmented_binary_message_reconstructs_bytewise_identically() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        server.receive().await.unwrap()
    });

    let mut client_options = ClientOptions::default();
    client_options.buffer_size = Some(3);
    let mut client = WebSocket::connect(client_stream, "ws://localhost/", client_options)
        .await
        .unwrap();

    let payload: Vec<u8> = (0..10).collect();
    client.send_binary(payload.clone()).await.unwrap();

    let received = server_task.await.unwrap();
    assert_eq!(received, Message::Binary(payload));
}

#[tokio::test]
async fn a_ping_is_answered_automatically_without_surfacing_to_the_caller() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        server.send_ping(b"x".to_vec()).await.unwrap();
        server.send_text("after the ping").await.unwrap();
    });

    let mut client = WebSocket::connect(client_stream, "ws://localhost/", ClientOptions::default())
        .await
        .unwrap();
    // the client's `receive` swallows the ping (replying with a pong internally) and yields
    // the text message that follows it, never surfacing the ping/pong pair to this caller.
    let received = client.receive().await.unwrap();
    server_task.await.unwrap();

    assert_eq!(received, Message::Text("after the ping".to_string()));
}

#[tokio::test]
async fn close_with_code_and_reason_completes_the_closing_handshake_on_both_sides() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        server.receive().await.unwrap()
    });

    let mut client = WebSocket::connect(client_stream, "ws://localhost/", ClientOptions::default())
        .await
        .unwrap();
    client.close(1000, "bye").await.unwrap();

    let received_by_server = server_task.await.unwrap();
    assert_eq!(
        received_by_server,
        Message::Close {
            code: 1000,
            reason: "bye".to_string()
        }
    );
    assert!(client.is_closed());
}

#[tokio::test]
async fn peer_close_with_no_payload_is_reported_as_code_1000() {
    let (client_stream, server_stream) = duplex(64 * 1024);

    let server_task = tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        // a close with no status is the empty-payload CloseFrame from spec §3; it echoes back
        // as code 1000 on the other side per §6.
        server.close(0, "").await.unwrap();
    });

    let mut client = WebSocket::connect(client_stream, "ws://localhost/", ClientOptions::default())
        .await
        .unwrap();
    let received = client.receive().await.unwrap();
    server_task.await.unwrap();

    assert_eq!(
        received,
        Message::Close {
            code: 1000,
            reason: String::new()
        }
    );
}

#[tokio::test]
async fn sending_after_the_endpoint_is_closed_fails_with_a_stable_error() {
    let (client_stream, server_stream) = duplex(64 * 1024);
    tokio::spawn(async move {
        let mut server = WebSocket::accept(server_stream, ServerOptions::default())
            .await
            .unwrap();
        let _ = server.receive().await;
    });

    let mut client = WebSocket::connect(client_stream, "ws://localhost/", ClientOptions::default())
        .await
        .unwrap();
    client.close(1000, "bye").await.unwrap();

    let err = client.send_text("too late").await.unwrap_err();
    assert!(matches!(err, socket_flow::Error::EndpointClosed));
}
