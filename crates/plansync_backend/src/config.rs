//! Backend configuration.

use std::time::Duration;

/// Configuration for [`MemoryBackend`](crate::MemoryBackend).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Schema stamped on change events.
    pub schema: String,
    /// Capacity of the unfiltered firehose. Filtered subscriptions pick their
    /// own capacity.
    pub feed_capacity: usize,
    /// Secret key for access tokens.
    pub auth_secret: Vec<u8>,
    /// How long an access token stays valid.
    pub token_ttl: Duration,
}

impl BackendConfig {
    /// Creates a configuration with the given token secret.
    pub fn new(auth_secret: Vec<u8>) -> Self {
        Self {
            schema: "public".to_string(),
            feed_capacity: 256,
            auth_secret,
            token_ttl: Duration::from_secs(60 * 60),
        }
    }

    /// Sets the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the feed capacity (at least 1).
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity.max(1);
        self
    }

    /// Sets the token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(b"plansync-local-development-secret".to_vec())
    }
}
