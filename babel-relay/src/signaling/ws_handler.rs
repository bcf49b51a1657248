use crate::{RelayConfig, RelayHub};
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use babel_core::{ClientMessage, ParticipantId, RelayMessage};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Routes: `/ws` for relay-assigned ids, `/ws/{participant_id}` for self-chosen ones.
pub fn router(hub: RelayHub) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/{participant_id}", get(ws_handler_with_id))
        .with_state(hub)
}

pub async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.addr).await?;
    serve_with_listener(listener, RelayHub::new()).await
}

pub async fn serve_with_listener(listener: TcpListener, hub: RelayHub) -> anyhow::Result<()> {
    info!("Relay listening on ws://{}", listener.local_addr()?);
    axum::serve(listener, router(hub)).await?;
    Ok(())
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let participant_id = hub.connect(tx);
        handle_socket(socket, participant_id, rx, hub).await;
    })
}

pub async fn ws_handler_with_id(
    ws: WebSocketUpgrade,
    Path(participant_id): Path<String>,
    State(hub): State<RelayHub>,
) -> Response {
    let participant_id = ParticipantId::from(participant_id);
    if hub.is_connected(&participant_id) {
        return (StatusCode::CONFLICT, "participant id already connected").into_response();
    }

    ws.on_upgrade(move |mut socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = hub.connect_as(participant_id.clone(), tx) {
            warn!("Rejecting connection: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        handle_socket(socket, participant_id, rx, hub).await;
    })
    .into_response()
}

async fn handle_socket(
    socket: WebSocket,
    participant_id: ParticipantId,
    mut rx: mpsc::UnboundedReceiver<RelayMessage>,
    hub: RelayHub,
) {
    info!("New relay connection: {}", participant_id);

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize relay message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let hub = hub.clone();
        let participant_id = participant_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(msg) => hub.handle(&participant_id, msg),
                        Err(e) => warn!("Invalid ClientMessage from {}: {:?}", participant_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    hub.disconnect(&participant_id);
    info!("Relay connection closed: {}", participant_id);
}
