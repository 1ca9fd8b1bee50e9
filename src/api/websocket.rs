//! WebSocket transport
//!
//! One receive task decodes inbound frames and dispatches them in order; one
//! send task drains the connection's outbox. When either ends the other is
//! stopped and the connection's subscriptions are dropped.

use super::handlers::AppState;
use super::hub::generate_connection_id;
use super::protocol::InboundCommand;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let client_id = generate_connection_id();
    let hub = state.router.hub().clone();
    let mut outbox = hub.register(&client_id);
    state.metrics.connection_opened();

    info!(
        "🔌 WebSocket client {} connected (total: {})",
        client_id,
        hub.connection_count()
    );

    let (mut sender, mut receiver) = socket.split();

    let client_id_for_send = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let message = match serde_json::to_string(&event) {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    error!("Failed to serialize {} event: {}", event.name(), e);
                    continue;
                }
            };
            if sender.send(message).await.is_err() {
                debug!("Client {} disconnected", client_id_for_send);
                break;
            }
        }
    });

    let router = state.router.clone();
    let client_id_for_receive = client_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match InboundCommand::parse(&text) {
                    Ok(command) => router.dispatch(&client_id_for_receive, command).await,
                    Err(e) => debug!(
                        "Ignoring malformed frame from client {}: {}",
                        client_id_for_receive, e
                    ),
                },
                Ok(Message::Close(_)) => {
                    info!("Client {} requested close", client_id_for_receive);
                    break;
                }
                Err(e) => {
                    warn!("WebSocket error from client {}: {}", client_id_for_receive, e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut receive_task => {
            debug!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
        _ = &mut send_task => {
            debug!("Send task completed for client {}", client_id);
            receive_task.abort();
        }
    }

    hub.unregister(&client_id);
    state.metrics.connection_closed();
    info!(
        "🔌 WebSocket client {} disconnected (remaining: {})",
        client_id,
        hub.connection_count()
    );
}
