//! Handshake state machine: Connecting -> Authenticated -> Closed.
//!
//! A connection that never presents a valid `join` within the grace period is
//! closed without ever touching the registry. Timeout and rejection are
//! ordinary outcomes, not server errors; the client reconnects with a fresh
//! token.

use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::time::timeout;

use crate::session::{SessionRejected, SessionStore, SessionToken, ValidatedSession};

use super::message::ClientMessage;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no join message within the grace period")]
    Timeout,
    #[error("session rejected: {0}")]
    Rejected(#[from] SessionRejected),
    #[error("connection closed before authenticating")]
    ConnectionClosed,
}

/// Wait for the client's `join` message, bounded by the grace period.
///
/// Frames other than a parseable `join` are ignored while connecting; they
/// spend the client's grace period, nothing more.
pub async fn await_join<S>(stream: &mut S, grace: Duration) -> Result<SessionToken, HandshakeError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    timeout(grace, read_join(stream))
        .await
        .map_err(|_| HandshakeError::Timeout)?
}

async fn read_join<S>(stream: &mut S) -> Result<SessionToken, HandshakeError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "Transport error while connecting");
                return Err(HandshakeError::ConnectionClosed);
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Join { token }) => return Ok(SessionToken::new(token)),
                Ok(_) => {
                    tracing::debug!("Ignoring pre-join message");
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring unparseable pre-join frame");
                }
            },
            Message::Close(_) => return Err(HandshakeError::ConnectionClosed),
            _ => {}
        }
    }

    Err(HandshakeError::ConnectionClosed)
}

/// Validate the presented token and refresh the session's activity stamp.
///
/// The error keeps the precise rejection reason for the server logs; callers
/// must not forward it to the client.
pub async fn authenticate(
    store: &dyn SessionStore,
    token: &SessionToken,
) -> Result<ValidatedSession, HandshakeError> {
    let session = store.validate(token).await?;
    store.touch(token).await;
    Ok(session)
}
