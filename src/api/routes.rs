use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::handlers::{emit_event, revoke_session, upsert_session};
use super::health::health;

pub fn api_routes(state: AppState) -> Router<AppState> {
    let internal = Router::new()
        .route("/events", post(emit_event))
        .route("/sessions", put(upsert_session))
        .route("/sessions/{token}", delete(revoke_session))
        .layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        .route("/health", get(health))
        .nest("/internal/v1", internal)
}
