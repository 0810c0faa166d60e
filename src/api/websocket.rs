//! WebSocket push of client events
//!
//! Each connection first receives the current snapshot, then every
//! [`ClientEvent`] as it happens.

use crate::api::handlers::ApiState;
use crate::client::{ClientEvent, ClientSnapshot, ContractStateClient};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Frames sent to WebSocket clients
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsFrame {
    /// Full state, sent on connect and after the subscriber lagged
    Snapshot(ClientSnapshot),
    Event(ClientEvent),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> impl IntoResponse {
    let client = state.client.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, client))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, client: Arc<ContractStateClient>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so nothing falls in between
    let mut rx = client.subscribe();

    let welcome = WsFrame::Snapshot(client.snapshot());
    if let Ok(json) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    // Forward client events to this socket
    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = match rx.recv().await {
                Ok(event) => WsFrame::Event(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("WebSocket subscriber lagged by {} events", skipped);
                    WsFrame::Snapshot(client.snapshot())
                }
                Err(RecvError::Closed) => break,
            };

            if let Ok(json) = serde_json::to_string(&frame) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages (for ping/pong and graceful close)
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    log::debug!("Ignoring text message: {}", text.as_str());
                }
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    log::info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FieldState;
    use crate::contract::{Field, Value};

    #[test]
    fn test_frame_serialization() {
        let frame = WsFrame::Event(ClientEvent::FieldChanged {
            field: Field::Message,
            state: FieldState::stale(Value::Text(String::new())),
        });

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.starts_with(r#"{"type":"Event","data":{"type":"FieldChanged""#));
    }
}
