//! Identity types and the session-validation boundary.
//!
//! The broker never owns sessions: it reads them through the [`SessionStore`]
//! trait and leaves creation/invalidation to the portal backend (login and
//! logout hooks feed the store through [`SessionWriter`]).

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;

pub use memory::MemorySessionStore;

/// Portal-assigned user id. Opaque to the broker; never parsed or compared
/// against raw tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role attached to an identity at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved (user id, role) pair backing an authenticated connection.
/// Immutable once resolved from a session; the single canonical key for rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.user_id, self.role)
    }
}

/// Bearer token presented during the handshake. Opaque; the `Debug` impl
/// redacts it so a full token never lands in the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log correlation.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.redacted())
    }
}

/// Successful validation result: who the token belongs to and until when.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Why a token was rejected. Logged internally, never sent to the client
/// (invalid vs expired must not be distinguishable from outside).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionRejected {
    #[error("unknown token")]
    UnknownToken,
    #[error("session expired")]
    Expired,
    #[error("session inactive")]
    Inactive,
}

/// Read-side session contract consumed by the broker.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a token to its identity, rejecting inactive or expired sessions.
    async fn validate(&self, token: &SessionToken) -> Result<ValidatedSession, SessionRejected>;

    /// Refresh the session's last-activity timestamp. Called once per
    /// successful handshake; failures are logged by the implementation and
    /// never surface to the caller.
    async fn touch(&self, token: &SessionToken);
}

/// Write-side session contract used by the internal session admin API
/// (the portal's login/logout hooks).
#[async_trait]
pub trait SessionWriter: Send + Sync {
    async fn upsert(&self, token: SessionToken, identity: Identity, expires_at: DateTime<Utc>);

    /// Mark a session inactive. Returns false if the token was unknown.
    async fn revoke(&self, token: &SessionToken) -> bool;
}
