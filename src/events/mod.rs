//! Domain events and the channel CRUD handlers publish them into.
//!
//! Events are ephemeral: no persistence, no replay. A client that was offline
//! when an event fired reconciles by re-fetching the underlying record on
//! reconnect.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::router::EventRouter;
use crate::session::Identity;

/// Application-level occurrences the portal pushes to connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HealthMetricsUpdated,
    MedicationAdded,
    MedicationUpdated,
    MedicationDeleted,
    NewAppointment,
    AppointmentUpdated,
    AppointmentApproved,
    AppointmentRejected,
    NewLabReport,
    Notification,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HealthMetricsUpdated => "health_metrics_updated",
            Self::MedicationAdded => "medication_added",
            Self::MedicationUpdated => "medication_updated",
            Self::MedicationDeleted => "medication_deleted",
            Self::NewAppointment => "new_appointment",
            Self::AppointmentUpdated => "appointment_updated",
            Self::AppointmentApproved => "appointment_approved",
            Self::AppointmentRejected => "appointment_rejected",
            Self::NewLabReport => "new_lab_report",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain event with its intended recipients. The target set is fixed at
/// creation; delivering to targets that are offline is a no-op, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub payload: Value,
    pub targets: HashSet<Identity>,
    pub created_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, payload: Value, targets: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            targets: targets.into_iter().collect(),
            created_at: Utc::now(),
        }
    }

    pub fn for_identity(kind: EventKind, payload: Value, target: Identity) -> Self {
        Self::new(kind, payload, [target])
    }
}

/// Publisher half of the domain-event pipeline.
///
/// CRUD call sites clone this freely and publish without touching transport
/// concerns; a single relay task drains the channel into the [`EventRouter`].
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget publish. An event raised after shutdown is dropped
    /// with a warning.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind;
        if self.tx.send(event).is_err() {
            tracing::warn!(kind = %kind, "Event dropped: relay has shut down");
        }
    }
}

/// Forwards published events into the router until every [`EventBus`] handle
/// is gone. Spawned once at startup.
pub async fn run_relay(mut rx: mpsc::UnboundedReceiver<DomainEvent>, router: Arc<EventRouter>) {
    while let Some(event) = rx.recv().await {
        router.publish(&event);
    }
    tracing::info!("Event relay stopped");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::session::{Role, UserId};

    #[test]
    fn event_kinds_serialize_as_snake_case_strings() {
        for (kind, wire) in [
            (EventKind::HealthMetricsUpdated, "\"health_metrics_updated\""),
            (EventKind::MedicationDeleted, "\"medication_deleted\""),
            (EventKind::NewAppointment, "\"new_appointment\""),
            (EventKind::AppointmentApproved, "\"appointment_approved\""),
            (EventKind::NewLabReport, "\"new_lab_report\""),
            (EventKind::Notification, "\"notification\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), wire);
            assert_eq!(wire.trim_matches('"'), kind.as_str());
        }
    }

    #[test]
    fn duplicate_targets_collapse() {
        let target = Identity::new(UserId::new("u1"), Role::Patient);
        let event = DomainEvent::new(
            EventKind::Notification,
            json!({"text": "hi"}),
            [target.clone(), target],
        );
        assert_eq!(event.targets.len(), 1);
    }
}
