use log::{error, info};
use socket_flow::{Message, ServerOptions, WebSocket};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};

async fn handle_connection(_: SocketAddr, stream: TcpStream) {
    let result = WebSocket::serve(stream, ServerOptions::default(), |ws| async move {
        loop {
            match ws.receive().await {
                Ok(Message::Close { .. }) => return Ok(()),
                Ok(message) => ws.send(message).await?,
                Err(err) => return Err(err),
            }
        }
    })
    .await;

    if let Err(err) = result {
        error!("connection ended with an error: {err}");
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = "127.0.0.1:9002";
    let listener = TcpListener::bind(&addr).await.expect("can't listen");
    info!("listening on: {addr}");

    while let Ok((stream, _)) = listener.accept().await {
        let peer = stream
            .peer_addr()
            .expect("connected streams should have a peer address");
        info!("peer address: {peer}");

        tokio::spawn(handle_connection(peer, stream));
    }
}
