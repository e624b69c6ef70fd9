//! Session gateway: the WebSocket endpoint that delivers relay events.
//!
//! A connection may carry a `user_id` handshake query parameter (already
//! authenticated upstream). If present, the connection is registered with
//! the presence registry and becomes individually addressable; if absent,
//! the connection still receives broadcast events. On close or transport
//! error the connection is unregistered, which is a no-op when a newer
//! registration for the same user has already superseded this one.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use parley_shared::types::{ConnectionId, UserId};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::relay::Audience;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .map(UserId::new);
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: Option<UserId>, state: AppState) {
    let connection_id = ConnectionId::new();
    let (mut sink, mut stream) = socket.split();

    // Subscribe before registering so this connection sees its own
    // online-set broadcast.
    let mut events = state.service.relay().subscribe();

    match &user_id {
        Some(user) => {
            debug!(user = %user, connection = %connection_id, "gateway connection established");
            state
                .service
                .register_connection(user.clone(), connection_id)
                .await;
        }
        None => {
            debug!(connection = %connection_id, "unaddressable gateway connection established");
        }
    }

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Close(_))) | None => break,
                // Clients act through the HTTP API; other inbound frames are
                // ignored (pings are answered by axum itself).
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection = %connection_id, error = %e, "gateway connection error");
                    break;
                }
            },
            envelope = events.recv() => match envelope {
                Ok(envelope) if envelope.is_addressed_to(connection_id) => {
                    if let Audience::One { user_id, .. } = &envelope.audience {
                        debug!(user = %user_id, connection = %connection_id, "delivering targeted event");
                    }
                    let frame = match envelope.event.to_json() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "failed to encode event frame");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection = %connection_id, skipped, "gateway connection lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    state.service.unregister_connection(connection_id).await;
    debug!(connection = %connection_id, "gateway connection closed");
}
