//! Internal API handlers: event emission and session admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::events::DomainEvent;
use crate::server::AppState;
use crate::session::{Identity, SessionToken};

use super::models::{EmitEventRequest, EmitEventResponse, UpsertSessionRequest};

/// Accept a domain event from a CRUD handler and hand it to the event bus.
/// Acceptance is not delivery: fan-out is best-effort to connected clients.
#[tracing::instrument(
    name = "http.emit_event",
    skip(state, request),
    fields(kind = %request.kind, targets = request.targets.len())
)]
pub async fn emit_event(
    State(state): State<AppState>,
    Json(request): Json<EmitEventRequest>,
) -> Result<Json<EmitEventResponse>> {
    if request.targets.is_empty() {
        return Err(AppError::Validation("targets must not be empty".into()));
    }

    let event = DomainEvent::new(request.kind, request.payload, request.targets);
    let response = EmitEventResponse {
        event_id: event.id,
        targets: event.targets.len(),
        timestamp: Utc::now(),
    };

    state.events.publish(event);

    Ok(Json(response))
}

/// Login hook from the portal backend.
#[tracing::instrument(
    name = "http.upsert_session",
    skip(state, request),
    fields(user_id = %request.user_id, role = %request.role)
)]
pub async fn upsert_session(
    State(state): State<AppState>,
    Json(request): Json<UpsertSessionRequest>,
) -> Result<StatusCode> {
    if request.expires_at <= Utc::now() {
        return Err(AppError::Validation(
            "expires_at must be in the future".into(),
        ));
    }

    state
        .session_writer
        .upsert(
            SessionToken::new(request.token),
            Identity::new(request.user_id, request.role),
            request.expires_at,
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Logout hook: invalidate a session. Already-connected clients keep their
/// connection (the handshake is the validation point); new handshakes with
/// this token are rejected.
#[tracing::instrument(name = "http.revoke_session", skip(state, token))]
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    let revoked = state
        .session_writer
        .revoke(&SessionToken::new(token))
        .await;

    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("unknown session token".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::Duration;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::api::api_routes;
    use crate::config::{ApiConfig, HandshakeConfig, ServerConfig, Settings};
    use crate::events::{DomainEvent, EventKind};
    use crate::server::AppState;
    use crate::session::{MemorySessionStore, SessionStore};

    use super::*;

    struct TestApi {
        app: Router,
        sessions: Arc<MemorySessionStore>,
        event_rx: mpsc::UnboundedReceiver<DomainEvent>,
    }

    fn test_api(api_key: Option<&str>) -> TestApi {
        let settings = Settings {
            server: ServerConfig::default(),
            handshake: HandshakeConfig::default(),
            api: ApiConfig {
                key: api_key.map(String::from),
            },
        };
        let sessions = Arc::new(MemorySessionStore::new());
        let (state, event_rx) = AppState::new(settings, sessions.clone(), sessions.clone());

        TestApi {
            app: api_routes(state.clone()).with_state(state),
            sessions,
            event_rx,
        }
    }

    fn request(method: &str, uri: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn emit_body(targets: serde_json::Value) -> serde_json::Value {
        json!({
            "kind": "new_lab_report",
            "payload": {"report_id": "r1"},
            "targets": targets,
        })
    }

    #[tokio::test]
    async fn emit_with_empty_targets_is_a_bad_request() {
        let api = test_api(None);

        let response = api
            .app
            .oneshot(request("POST", "/internal/v1/events", None, emit_body(json!([]))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn emit_hands_the_event_to_the_bus() {
        let mut api = test_api(None);

        let targets = json!([{"user_id": "u1", "role": "patient"}]);
        let response = api
            .app
            .oneshot(request("POST", "/internal/v1/events", None, emit_body(targets)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let event = api.event_rx.try_recv().expect("event should be on the bus");
        assert_eq!(event.kind, EventKind::NewLabReport);
        assert_eq!(event.targets.len(), 1);
    }

    #[tokio::test]
    async fn upsert_with_past_expiry_is_a_bad_request() {
        let api = test_api(None);

        let body = json!({
            "token": "tok-1",
            "user_id": "u1",
            "role": "patient",
            "expires_at": Utc::now() - Duration::minutes(1),
        });
        let response = api
            .app
            .oneshot(request("PUT", "/internal/v1/sessions", None, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upserted_session_validates_until_revoked() {
        let api = test_api(None);

        let body = json!({
            "token": "tok-1",
            "user_id": "u1",
            "role": "doctor",
            "expires_at": Utc::now() + Duration::minutes(30),
        });
        let response = api
            .app
            .clone()
            .oneshot(request("PUT", "/internal/v1/sessions", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let session = api
            .sessions
            .validate(&SessionToken::new("tok-1"))
            .await
            .unwrap();
        assert_eq!(session.identity.user_id.as_str(), "u1");

        let response = api
            .app
            .oneshot(request("DELETE", "/internal/v1/sessions/tok-1", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(api.sessions.validate(&SessionToken::new("tok-1")).await.is_err());
    }

    #[tokio::test]
    async fn revoking_an_unknown_token_is_not_found() {
        let api = test_api(None);

        let response = api
            .app
            .oneshot(request("DELETE", "/internal/v1/sessions/missing", None, json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn internal_endpoints_require_the_configured_api_key() {
        let api = test_api(Some("hunter2"));

        let missing = api
            .app
            .clone()
            .oneshot(request("POST", "/internal/v1/events", None, emit_body(json!([]))))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = api
            .app
            .clone()
            .oneshot(request("POST", "/internal/v1/events", Some("nope"), emit_body(json!([]))))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        // The right key reaches the handler (which then rejects the body).
        let right = api
            .app
            .oneshot(request(
                "POST",
                "/internal/v1/events",
                Some("hunter2"),
                emit_body(json!([])),
            ))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unconfigured_api_key_allows_all_requests() {
        let api = test_api(None);

        let response = api
            .app
            .oneshot(request("POST", "/internal/v1/events", None, emit_body(json!([]))))
            .await
            .unwrap();

        // 400 from the handler, not 401 from the guard.
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
