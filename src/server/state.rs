use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::events::{DomainEvent, EventBus};
use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;
use crate::session::{SessionStore, SessionWriter};

/// Shared application state, constructed once at startup and injected
/// everywhere (no module-level singletons; tests build their own).
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub session_store: Arc<dyn SessionStore>,
    pub session_writer: Arc<dyn SessionWriter>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: Arc<EventRouter>,
    pub events: EventBus,
}

impl AppState {
    /// Build the state and the receiving half of the event bus; the caller
    /// spawns [`crate::events::run_relay`] on the receiver.
    pub fn new(
        settings: Settings,
        session_store: Arc<dyn SessionStore>,
        session_writer: Arc<dyn SessionWriter>,
    ) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = Arc::new(EventRouter::new(registry.clone()));
        let (events, event_rx) = EventBus::channel();

        let state = Self {
            settings: Arc::new(settings),
            session_store,
            session_writer,
            registry,
            router,
            events,
        };

        (state, event_rx)
    }
}
