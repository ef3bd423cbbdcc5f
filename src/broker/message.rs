//! Wire protocol for the WebSocket broker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::events::{DomainEvent, EventKind};
use crate::session::{Identity, Role, UserId};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Handshake message; must arrive within the grace period.
    Join { token: String },
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    JoinAck {
        connection_id: Uuid,
        user_id: UserId,
        role: Role,
    },
    Event {
        id: Uuid,
        kind: EventKind,
        payload: Value,
    },
    Pong,
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn join_ack(connection_id: Uuid, identity: &Identity) -> Self {
        Self::JoinAck {
            connection_id,
            user_id: identity.user_id.clone(),
            role: identity.role,
        }
    }

    pub fn event(event: &DomainEvent) -> Self {
        Self::Event {
            id: event.id,
            kind: event.kind,
            payload: event.payload.clone(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Frame queued on a connection's outbound channel.
///
/// `Shared` carries a frame serialized once by the router for larger fan-outs;
/// `Raw` is serialized by the connection's send task.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Raw(ServerMessage),
    Shared(Arc<str>),
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Raw(message) => serde_json::to_string(message),
            Self::Shared(json) => Ok(json.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_message_parses_from_wire_format() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"join","payload":{"token":"tok-1"}}"#).unwrap();
        match parsed {
            ClientMessage::Join { token } => assert_eq!(token, "tok-1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn ping_message_parses_without_payload() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(parsed, ClientMessage::Ping));
    }

    #[test]
    fn event_frame_carries_kind_and_payload() {
        let identity = Identity::new(UserId::new("u1"), Role::Patient);
        let event = DomainEvent::for_identity(
            EventKind::NewAppointment,
            json!({"appointment_id": "a1"}),
            identity,
        );

        let frame = serde_json::to_value(ServerMessage::event(&event)).unwrap();
        assert_eq!(frame["type"], "event");
        assert_eq!(frame["kind"], "new_appointment");
        assert_eq!(frame["payload"]["appointment_id"], "a1");
    }

    #[test]
    fn join_ack_exposes_identity_but_not_token() {
        let identity = Identity::new(UserId::new("u1"), Role::Doctor);
        let ack = serde_json::to_value(ServerMessage::join_ack(Uuid::new_v4(), &identity)).unwrap();
        assert_eq!(ack["type"], "join_ack");
        assert_eq!(ack["user_id"], "u1");
        assert_eq!(ack["role"], "doctor");
    }
}
