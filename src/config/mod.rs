mod settings;

pub use settings::{ApiConfig, HandshakeConfig, ServerConfig, Settings};
