//! HTTP surface: health endpoint plus the internal API the portal backend
//! uses to emit domain events and feed session state.

mod handlers;
mod health;
mod models;
mod routes;

pub use models::{EmitEventRequest, EmitEventResponse, UpsertSessionRequest};
pub use routes::api_routes;
