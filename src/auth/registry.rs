//! Auth type → strategy lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{AuthStrategy, JwtStrategy};
use crate::config::{AuthConfig, ConfigError};

/// Registered strategies keyed by lowercased identifier.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    strategies: HashMap<String, Arc<dyn AuthStrategy>>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the `auth` config section.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        if let Some(jwt) = &config.jwt {
            registry.register(Arc::new(JwtStrategy::from_config(jwt)?));
        }
        Ok(registry)
    }

    /// Store a strategy under its identifier, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn AuthStrategy>) -> Option<Arc<dyn AuthStrategy>> {
        let key = strategy.identifier().to_ascii_lowercase();
        tracing::debug!(auth_type = %key, "Registered auth strategy");
        self.strategies.insert(key, strategy)
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, identifier: &str) -> Option<Arc<dyn AuthStrategy>> {
        self.strategies
            .get(&identifier.to_ascii_lowercase())
            .cloned()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.strategies.contains_key(&identifier.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
