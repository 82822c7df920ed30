//! Configuration for the sync engine.

/// Default upper bound on the number of items in one push batch.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 10_000;

/// Configuration for pull and push handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of created, updated and deleted items in one push.
    /// Larger batches are rejected as malformed before touching the store.
    pub max_batch_items: usize,
    /// Whether creating an ID that already exists and is live applies the
    /// payload as an update instead of failing.
    ///
    /// Clients retry whole batches after a partial failure, so a replayed
    /// create is the common case rather than a conflict.
    pub idempotent_creates: bool,
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            idempotent_creates: true,
        }
    }

    /// Sets the maximum number of items in one push.
    pub fn with_max_batch_items(mut self, max: usize) -> Self {
        self.max_batch_items = max;
        self
    }

    /// Sets whether replayed creates are applied as updates.
    pub fn with_idempotent_creates(mut self, enabled: bool) -> Self {
        self.idempotent_creates = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_batch_items, 10_000);
        assert!(config.idempotent_creates);
    }

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_max_batch_items(5)
            .with_idempotent_creates(false);
        assert_eq!(config.max_batch_items, 5);
        assert!(!config.idempotent_creates);
    }
}
