//! Server configuration.

use memodeck_protocol::DEFAULT_PULL_LIMIT;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Page size when a pull omits its limit.
    pub default_pull_limit: u32,
    /// Hard ceiling a pull limit is clamped to.
    pub max_pull_limit: u32,
    /// Maximum operations accepted in one push batch.
    pub max_push_batch: usize,
}

impl ServerConfig {
    /// Creates a configuration with the default limits.
    pub fn new() -> Self {
        Self {
            default_pull_limit: DEFAULT_PULL_LIMIT,
            max_pull_limit: 500,
            max_push_batch: 500,
        }
    }

    /// Sets the default pull page size.
    pub fn with_default_pull_limit(mut self, limit: u32) -> Self {
        self.default_pull_limit = limit;
        self
    }

    /// Sets the pull limit ceiling.
    pub fn with_max_pull_limit(mut self, limit: u32) -> Self {
        self.max_pull_limit = limit;
        self
    }

    /// Sets the push batch ceiling.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
