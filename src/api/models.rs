//! Request/response models for the internal API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::EventKind;
use crate::session::{Identity, Role, UserId};

/// Emitted by the portal's CRUD handlers after a domain write.
#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    pub kind: EventKind,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Recipients; must not be empty (an event with nobody to tell is a
    /// caller bug, not a broker decision).
    pub targets: Vec<Identity>,
}

#[derive(Debug, Serialize)]
pub struct EmitEventResponse {
    pub event_id: Uuid,
    pub targets: usize,
    pub timestamp: DateTime<Utc>,
}

/// Login hook: mint or refresh a session for a user.
#[derive(Debug, Deserialize)]
pub struct UpsertSessionRequest {
    pub token: String,
    pub user_id: UserId,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}
