use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct WsQuery {
    /// Session whose events are forwarded. Events carry holder addresses, so
    /// there is no unfiltered stream.
    session: String,
}

/// `GET /ws?session=<id>`: WebSocket upgrade for one session's events.
async fn ws_handler(
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.event_tx.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, query.session))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<String>,
    session: String,
) {
    tracing::info!(session = %session, "WebSocket client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if !event_for_session(&msg, &session) {
                            continue;
                        }
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "WebSocket client lagged, skipping messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    tracing::info!("WebSocket client disconnected");
}

/// Events carry the session either as `sessionId` or inside `session.id`.
fn event_for_session(msg: &str, id: &str) -> bool {
    let Ok(event) = serde_json::from_str::<serde_json::Value>(msg) else {
        return false;
    };
    let event_id = event
        .get("sessionId")
        .or_else(|| event.get("session").and_then(|s| s.get("id")))
        .and_then(|v| v.as_str());
    event_id == Some(id)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}
