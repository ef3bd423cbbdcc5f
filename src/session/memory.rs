//! In-process session store backed by a concurrent map.
//!
//! Used by the binary and by tests. The portal backend feeds it through the
//! internal session admin API; document-store-backed deployments implement
//! [`SessionStore`] themselves and never touch this type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{
    Identity, SessionRejected, SessionStore, SessionToken, SessionWriter, ValidatedSession,
};

struct SessionRecord {
    identity: Identity,
    is_active: bool,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

/// DashMap-backed implementation of [`SessionStore`] and [`SessionWriter`].
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionToken, SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn validate(&self, token: &SessionToken) -> Result<ValidatedSession, SessionRejected> {
        let record = self
            .sessions
            .get(token)
            .ok_or(SessionRejected::UnknownToken)?;

        if !record.is_active {
            return Err(SessionRejected::Inactive);
        }
        if record.expires_at <= Utc::now() {
            return Err(SessionRejected::Expired);
        }

        Ok(ValidatedSession {
            identity: record.identity.clone(),
            expires_at: record.expires_at,
        })
    }

    async fn touch(&self, token: &SessionToken) {
        if let Some(mut record) = self.sessions.get_mut(token) {
            record.last_activity = Utc::now();
        }
    }
}

#[async_trait]
impl SessionWriter for MemorySessionStore {
    async fn upsert(&self, token: SessionToken, identity: Identity, expires_at: DateTime<Utc>) {
        tracing::debug!(token = ?token, identity = %identity, "Session upserted");
        self.sessions.insert(
            token,
            SessionRecord {
                identity,
                is_active: true,
                expires_at,
                last_activity: Utc::now(),
            },
        );
    }

    async fn revoke(&self, token: &SessionToken) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut record) => {
                record.is_active = false;
                tracing::debug!(token = ?token, "Session revoked");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::session::{Role, UserId};

    fn identity(id: &str) -> Identity {
        Identity::new(UserId::new(id), Role::Patient)
    }

    async fn store_with(token: &str, expires_in: Duration) -> MemorySessionStore {
        let store = MemorySessionStore::new();
        store
            .upsert(
                SessionToken::new(token),
                identity("u1"),
                Utc::now() + expires_in,
            )
            .await;
        store
    }

    #[tokio::test]
    async fn validates_active_session() {
        let store = store_with("tok-1", Duration::minutes(30)).await;
        let session = store.validate(&SessionToken::new("tok-1")).await.unwrap();
        assert_eq!(session.identity, identity("u1"));
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let store = MemorySessionStore::new();
        let err = store
            .validate(&SessionToken::new("missing"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionRejected::UnknownToken);
    }

    #[tokio::test]
    async fn rejects_expired_session() {
        let store = store_with("tok-1", Duration::minutes(-1)).await;
        let err = store
            .validate(&SessionToken::new("tok-1"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionRejected::Expired);
    }

    #[tokio::test]
    async fn rejects_revoked_session() {
        let store = store_with("tok-1", Duration::minutes(30)).await;
        assert!(store.revoke(&SessionToken::new("tok-1")).await);
        let err = store
            .validate(&SessionToken::new("tok-1"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionRejected::Inactive);
    }

    #[tokio::test]
    async fn revoke_of_unknown_token_reports_false() {
        let store = MemorySessionStore::new();
        assert!(!store.revoke(&SessionToken::new("missing")).await);
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = SessionToken::new("super-secret-session-token");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("secret-session"));
        assert!(rendered.contains("super-se"));
    }
}
