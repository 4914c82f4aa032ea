use log::{error, info};
use rand::distr::Alphanumeric;
use rand::Rng;
use socket_flow::{ClientOptions, Message, WebSocket};
use tokio::net::TcpStream;
use tokio::select;
use tokio::time::{interval, Duration};

async fn handle_connection(addr: &str) {
    let url = format!("ws://{addr}/");
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(err) => {
            error!("failed to connect to {addr}: {err}");
            return;
        }
    };

    match WebSocket::connect(stream, &url, ClientOptions::default()).await {
        Ok(mut ws) => {
            let mut ticker = interval(Duration::from_secs(5));
            let mut counter = 0;

            loop {
                select! {
                    result = ws.receive() => {
                        match result {
                            Ok(Message::Text(text)) => {
                                info!("received message: {text}");
                                counter += 1;
                                if counter >= 3 {
                                    if ws.close(1000, "bye").await.is_err() {
                                        error!("error occurred when closing connection");
                                    }
                                    break;
                                }
                            }
                            Ok(Message::Close { code, reason }) => {
                                info!("peer closed the connection: {code} {reason}");
                                break;
                            }
                            Ok(_) => {}
                            Err(err) => {
                                error!("received error from the stream: {err}");
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        let random_string = generate_random_string();
                        if ws.send_text(random_string).await.is_err() {
                            error!("failed to send message");
                            break;
                        }
                    }
                }
            }
        }
        Err(err) => error!("error when performing handshake: {err}"),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    handle_connection("127.0.0.1:9002").await;
}

fn generate_random_string() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}
