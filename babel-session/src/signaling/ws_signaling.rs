use crate::error::TransportError;
use crate::signaling::SignalingTransport;
use async_trait::async_trait;
use babel_core::{ClientMessage, RelayMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

struct Connection {
    tx: mpsc::UnboundedSender<ClientMessage>,
    task: JoinHandle<()>,
}

/// Signaling over a JSON WebSocket, e.g. `ws://host:3000/ws`.
pub struct WsSignalingTransport {
    url: String,
    connection: Mutex<Option<Connection>>,
}

impl WsSignalingTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SignalingTransport for WsSignalingTransport {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<RelayMessage>, TransportError> {
        let mut connection = self.connection.lock().await;
        if let Some(old) = connection.take() {
            old.task.abort();
        }

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!("Connected to relay at {}", self.url);

        let (tx_client, rx_client) = mpsc::unbounded_channel::<ClientMessage>();
        let (tx_relay, rx_relay) = mpsc::unbounded_channel::<RelayMessage>();

        let task = tokio::spawn(async move {
            handle_websocket(ws_stream, rx_client, tx_relay).await;
        });

        *connection = Some(Connection {
            tx: tx_client,
            task,
        });
        Ok(rx_relay)
    }

    async fn send(&self, msg: ClientMessage) -> Result<(), TransportError> {
        let connection = self.connection.lock().await;
        let connection = connection.as_ref().ok_or(TransportError::Closed)?;
        connection.tx.send(msg).map_err(|_| TransportError::Closed)
    }

    async fn disconnect(&self) {
        let Some(connection) = self.connection.lock().await.take() else {
            return;
        };
        // Dropping the sender lets the socket task flush and close.
        drop(connection.tx);
        let _ = connection.task.await;
        info!("Disconnected from relay at {}", self.url);
    }
}

async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_client: mpsc::UnboundedReceiver<ClientMessage>,
    tx_relay: mpsc::UnboundedSender<RelayMessage>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            outgoing = rx_client.recv() => {
                let Some(msg) = outgoing else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("{}", TransportError::Encode(e.to_string()));
                        continue;
                    }
                };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<RelayMessage>(&text) {
                            Ok(msg) => {
                                if tx_relay.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Invalid RelayMessage: {:?}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Relay socket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    debug!("Relay socket task finished");
}
