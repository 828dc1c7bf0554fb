//! Websocket fan-out of the `smart_money` channel: every open session
//! receives each classified whale movement as one JSON text frame.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::bus::{EventBus, SMART_MONEY};

use super::AppState;

pub async fn smart_money_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let bus = state.bus.clone();
    ws.on_upgrade(move |socket| session(socket, bus))
}

async fn session(socket: WebSocket, bus: EventBus) {
    let (mut sender, mut receiver) = socket.split();
    let Ok(mut feed) = bus.subscribe(SMART_MONEY) else {
        return;
    };

    tracing::debug!("websocket session opened");

    let forward = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(payload) => {
                    let frame = Message::Text(payload.to_string().into());
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "websocket session lagged, skipping ahead");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Drain client frames so pings are answered; anything else is ignored.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    forward.abort();
    tracing::debug!("websocket session closed");
}
