// Domain layer
pub mod events;
pub mod registry;
pub mod router;
pub mod session;

// Application layer
pub mod api;
pub mod broker;
pub mod server;

// Supporting modules
pub mod config;
pub mod error;
