//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use plansync_protocol::ConflictPolicy;
use std::time::Duration;

/// Environment variable overriding [`SyncConfig::max_retries`].
pub const ENV_MAX_RETRIES: &str = "PLANSYNC_MAX_RETRIES";
/// Environment variable overriding [`SyncConfig::entity_delay`], in milliseconds.
pub const ENV_ENTITY_DELAY_MS: &str = "PLANSYNC_ENTITY_DELAY_MS";
/// Environment variable overriding [`SyncConfig::schema`].
pub const ENV_SCHEMA: &str = "PLANSYNC_SCHEMA";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend schema watched by the realtime feed.
    pub schema: String,
    /// Failed pushes after which a record is left alone.
    pub max_retries: u32,
    /// Fixed pause between entities within a pass.
    pub entity_delay: Duration,
    /// Capacity of each realtime subscription channel.
    pub realtime_buffer: usize,
    /// How incoming snapshots are weighed against local rows.
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            max_retries: 5,
            entity_delay: Duration::from_millis(200),
            realtime_buffer: 256,
            conflict_policy: ConflictPolicy::LastWriteWins,
        }
    }
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from the process environment.
    ///
    /// Missing variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            config.max_retries = raw
                .trim()
                .parse()
                .map_err(|_| SyncError::Config(format!("{ENV_MAX_RETRIES}={raw:?} is not a count")))?;
        }
        if let Some(raw) = lookup(ENV_ENTITY_DELAY_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                SyncError::Config(format!("{ENV_ENTITY_DELAY_MS}={raw:?} is not a number of milliseconds"))
            })?;
            config.entity_delay = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ENV_SCHEMA) {
            let schema = raw.trim();
            if schema.is_empty() {
                return Err(SyncError::Config(format!("{ENV_SCHEMA} is empty")));
            }
            config.schema = schema.to_string();
        }
        Ok(config)
    }

    /// Sets the schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pause between entities.
    pub fn with_entity_delay(mut self, delay: Duration) -> Self {
        self.entity_delay = delay;
        self
    }

    /// Sets the realtime channel capacity.
    pub fn with_realtime_buffer(mut self, capacity: usize) -> Self {
        self.realtime_buffer = capacity.max(1);
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.schema, "public");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.entity_delay, Duration::from_millis(200));
        assert_eq!(config.conflict_policy, ConflictPolicy::LastWriteWins);
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_schema("app")
            .with_max_retries(2)
            .with_entity_delay(Duration::ZERO)
            .with_realtime_buffer(0);
        assert_eq!(config.schema, "app");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.entity_delay, Duration::ZERO);
        assert_eq!(config.realtime_buffer, 1);
    }

    #[test]
    fn lookup_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_MAX_RETRIES, "3"),
            (ENV_ENTITY_DELAY_MS, " 50 "),
            (ENV_SCHEMA, "planner"),
        ]))
        .unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.entity_delay, Duration::from_millis(50));
        assert_eq!(config.schema, "planner");

        let untouched = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(untouched.max_retries, 5);
    }

    #[test]
    fn lookup_rejects_garbage() {
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[(ENV_MAX_RETRIES, "five")])),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[(ENV_ENTITY_DELAY_MS, "-1")])),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[(ENV_SCHEMA, "  ")])),
            Err(SyncError::Config(_))
        ));
    }
}
