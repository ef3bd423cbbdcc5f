//! WebSocket connection handler: upgrade, handshake, then relay frames until
//! the transport closes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::registry::ConnectionHandle;
use crate::server::AppState;

use super::handshake;
use super::message::{ClientMessage, OutboundMessage, ServerMessage};

/// WebSocket upgrade handler. The presented token is checked only after the
/// upgrade, inside the `join` handshake.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let grace = state.settings.handshake.grace_period();

    // Connecting: one bounded chance to present a token.
    let token = match handshake::await_join(&mut ws_receiver, grace).await {
        Ok(token) => token,
        Err(reason) => {
            tracing::info!(reason = %reason, "Handshake not completed; closing");
            let _ = ws_sender.close().await;
            return;
        }
    };

    let session = match handshake::authenticate(state.session_store.as_ref(), &token).await {
        Ok(session) => session,
        Err(reason) => {
            // The reason stays in the logs; the client only sees the close.
            tracing::info!(token = ?token, reason = %reason, "Session rejected; closing");
            let _ = ws_sender.close().await;
            return;
        }
    };

    // Authenticated: register and acknowledge.
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(state.settings.handshake.send_buffer);
    let handle = Arc::new(ConnectionHandle::new(session.identity.clone(), tx));
    let connection_id = handle.id;
    state.registry.register(handle.clone());

    if handle
        .send(ServerMessage::join_ack(connection_id, &handle.identity))
        .await
        .is_err()
    {
        state.registry.unregister(connection_id);
        return;
    }

    tracing::info!(
        connection_id = %connection_id,
        identity = %handle.identity,
        expires_at = %session.expires_at,
        "WebSocket connection authenticated"
    );

    // Drain the outbound queue onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_json() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize outbound frame");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle inbound frames until the client goes away.
    let recv_handle = handle.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(message) => {
                    if !process_message(message, &recv_handle).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %recv_handle.id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // Closed: either task ending means the transport is done.
    state.registry.unregister(connection_id);

    tracing::info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Process one inbound frame on an authenticated connection.
/// Returns false when the connection should be torn down.
async fn process_message(message: Message, handle: &Arc<ConnectionHandle>) -> bool {
    match message {
        Message::Text(text) => {
            handle.update_activity();

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let _ = handle.send(ServerMessage::Pong).await;
                }
                Ok(ClientMessage::Join { .. }) => {
                    // Identity is fixed for the life of the connection.
                    tracing::warn!(
                        connection_id = %handle.id,
                        "Ignoring join on an already-authenticated connection"
                    );
                }
                Err(e) => {
                    let _ = handle
                        .send(ServerMessage::error("invalid_message", e.to_string()))
                        .await;
                }
            }
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            handle.update_activity();
            true
        }
        Message::Binary(_) => {
            let _ = handle
                .send(ServerMessage::error(
                    "unsupported_format",
                    "binary frames are not supported",
                ))
                .await;
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}
