use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

/// GET /ws: live feed of risk alerts and cycle summaries.
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_risk_events(socket, state))
}

async fn stream_risk_events(mut socket: WebSocket, state: AppState) {
    tracing::info!("Risk feed client connected");

    let mut rx = state.ws_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let msg = match event {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Risk feed client lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize risk event");
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    // Clients only listen
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!("Risk feed client disconnected");
}
