//! Server configuration.

use replisync_engine::EngineConfig;

/// Default limit on push request bodies: 8 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Configuration for the sync server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path of the sync endpoint. A trailing slash is optional when matching.
    pub endpoint: String,
    /// Maximum size of a push body in bytes.
    pub max_body_bytes: usize,
    /// Engine configuration.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            endpoint: "/sync/".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            engine: EngineConfig::default(),
        }
    }

    /// Sets the endpoint path.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the maximum push body size.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Sets the engine configuration.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Returns true if `path` addresses the sync endpoint.
    pub fn matches_endpoint(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.endpoint.trim_end_matches('/')
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
