//! Connection registry: the only mutable shared state in the broker core.

mod registry;
mod types;

pub use registry::{ConnectionRegistry, RegistryStats};
pub use types::ConnectionHandle;
