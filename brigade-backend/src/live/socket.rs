//! WebSocket transport for viewer sessions.

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use super::hub::{CloseReason, Outbound};
use super::state::LiveState;
use crate::service::AppState;

/// Upgrade `GET /ws` and start streaming positions.
pub async fn live_channel(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let live = state.live.clone();
    ws.on_upgrade(move |socket| serve_session(socket, live))
}

async fn serve_session(socket: WebSocket, live: Arc<LiveState>) {
    let mut session = live.connect().await;
    let id = session.id;
    let (mut sink, mut stream) = socket.split();

    let writer = async {
        while let Some(outbound) = session.rx.recv().await {
            let frame = match outbound {
                Outbound::Message(message) => match serde_json::to_string(&*message) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!("Failed to encode {} for session {}: {}", message.kind(), id, e);
                        continue;
                    }
                },
                Outbound::Probe => Message::Ping(Bytes::new()),
            };
            if let Err(e) = sink.send(frame).await {
                debug!("Send to session {} failed: {}", id, e);
                break;
            }
        }
        // queue closed by the hub (evicted) or send failure
        let _ = sink.send(Message::Close(None)).await;
    };

    let reader = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Pong(_)) => live.hub().mark_alive(id).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Receive from session {} failed: {}", id, e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    live.hub().close(id, CloseReason::Disconnected).await;
}
