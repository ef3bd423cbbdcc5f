//! Fan-out of domain events to the rooms of their target identities.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::broker::{OutboundMessage, ServerMessage};
use crate::events::DomainEvent;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// Serialize once and share the frame when a publish fans out this wide.
const PRESERIALIZE_THRESHOLD: usize = 4;

/// Outcome of a single publish: best-effort, connected recipients only.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub event_id: Uuid,
    /// Frames handed to a connection's outbound queue.
    pub delivered: usize,
    /// Frames dropped at the send boundary (queue full or closing).
    pub failed: usize,
    /// Target identities with no live connections.
    pub offline_targets: usize,
}

#[derive(Debug, Default)]
struct RouterStats {
    events_published: AtomicU64,
    frames_delivered: AtomicU64,
    frames_failed: AtomicU64,
    offline_targets: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStatsSnapshot {
    pub events_published: u64,
    pub frames_delivered: u64,
    pub frames_failed: u64,
    pub offline_targets: u64,
}

/// Stateless fan-out over the [`ConnectionRegistry`]: no queuing, no retry,
/// no persistence. Callers needing guaranteed delivery persist the underlying
/// record and let clients reconcile on reconnect.
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    stats: RouterStats,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            events_published: self.stats.events_published.load(Ordering::Relaxed),
            frames_delivered: self.stats.frames_delivered.load(Ordering::Relaxed),
            frames_failed: self.stats.frames_failed.load(Ordering::Relaxed),
            offline_targets: self.stats.offline_targets.load(Ordering::Relaxed),
        }
    }

    /// Deliver an event to every live connection of every target identity.
    ///
    /// Synchronous only up to the handoff to each connection's outbound
    /// queue; network sends happen in the connections' own tasks. Never
    /// blocks on a slow client and never holds a registry guard across a
    /// send.
    #[tracing::instrument(
        name = "router.publish",
        skip(self, event),
        fields(event_id = %event.id, kind = %event.kind, targets = event.targets.len())
    )]
    pub fn publish(&self, event: &DomainEvent) -> DeliveryReport {
        let mut recipients: Vec<Arc<ConnectionHandle>> = Vec::new();
        let mut offline_targets = 0;

        for identity in &event.targets {
            let room = self.registry.connections_for(identity);
            if room.is_empty() {
                // Documented no-op: the target is simply not connected.
                offline_targets += 1;
                tracing::debug!(identity = %identity, "No live connections for target");
                continue;
            }
            recipients.extend(room);
        }

        let mut delivered = 0;
        let mut failed = 0;

        if !recipients.is_empty() {
            match self.frame_for(event, recipients.len()) {
                Some(frame) => {
                    for handle in &recipients {
                        match handle.try_send(frame.clone()) {
                            Ok(()) => delivered += 1,
                            Err(TrySendError::Closed(_)) => {
                                // Disconnect in progress; its handler will
                                // unregister the connection.
                                failed += 1;
                                tracing::debug!(
                                    connection_id = %handle.id,
                                    "Send to closing connection skipped"
                                );
                            }
                            Err(TrySendError::Full(_)) => {
                                failed += 1;
                                tracing::warn!(
                                    connection_id = %handle.id,
                                    kind = %event.kind,
                                    "Outbound queue full; dropping frame"
                                );
                            }
                        }
                    }
                }
                None => failed = recipients.len(),
            }
        }

        self.stats.events_published.fetch_add(1, Ordering::Relaxed);
        self.stats
            .frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .frames_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
        self.stats
            .offline_targets
            .fetch_add(offline_targets as u64, Ordering::Relaxed);

        tracing::debug!(
            delivered = delivered,
            failed = failed,
            offline_targets = offline_targets,
            "Published event"
        );

        DeliveryReport {
            event_id: event.id,
            delivered,
            failed,
            offline_targets,
        }
    }

    fn frame_for(&self, event: &DomainEvent, fan_out: usize) -> Option<OutboundMessage> {
        let message = ServerMessage::event(event);
        if fan_out < PRESERIALIZE_THRESHOLD {
            return Some(OutboundMessage::Raw(message));
        }
        match serde_json::to_string(&message) {
            Ok(json) => Some(OutboundMessage::Shared(Arc::from(json))),
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Failed to serialize event");
                None
            }
        }
    }
}
