//! Per-connection handle.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::{OutboundMessage, ServerMessage};
use crate::session::Identity;

/// Handle for a single authenticated WebSocket connection.
///
/// The identity is fixed at handshake time; a client switching identity must
/// open a new connection.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub identity: Identity,
    pub sender: mpsc::Sender<OutboundMessage>,
    pub connected_at: DateTime<Utc>,
    /// Last activity as Unix seconds, lock-free.
    last_activity: AtomicI64,
}

impl ConnectionHandle {
    pub fn new(identity: Identity, sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity,
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    /// Queue a message, waiting for capacity. Used on the connection's own
    /// path (handshake ack, pong).
    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.sender.send(OutboundMessage::Raw(message)).await
    }

    /// Queue a frame without waiting. Used by the router so a slow client
    /// never blocks a publisher.
    pub fn try_send(
        &self,
        frame: OutboundMessage,
    ) -> Result<(), mpsc::error::TrySendError<OutboundMessage>> {
        self.sender.try_send(frame)
    }
}
