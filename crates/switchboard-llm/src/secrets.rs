//! API key lookup
//!
//! Providers ask for credentials by an ordered list of names and take the
//! first hit. Implementations must be safe for concurrent reads.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;

/// Source of API keys
pub trait SecretService: Send + Sync {
    /// Look up one secret by name
    fn get(&self, name: &str) -> Option<SecretString>;

    /// First secret that resolves, trying `names` in order
    fn first_of(&self, names: &[String]) -> Option<SecretString> {
        names.iter().find_map(|name| self.get(name))
    }
}

/// Reads secrets from the process environment
///
/// Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretService;

impl SecretService for EnvSecretService {
    fn get(&self, name: &str) -> Option<SecretString> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecretService {
    secrets: HashMap<String, SecretString>,
}

impl StaticSecretService {
    /// Create an empty service
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: &str) -> Self {
        self.secrets.insert(name.into(), SecretString::from(value));
        self
    }
}

impl SecretService for StaticSecretService {
    fn get(&self, name: &str) -> Option<SecretString> {
        self.secrets.get(name).cloned()
    }
}

/// Tries several services in order
#[derive(Clone, Default)]
pub struct ChainedSecretService {
    services: Vec<Arc<dyn SecretService>>,
}

impl ChainedSecretService {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service; earlier services win
    #[must_use]
    pub fn then(mut self, service: impl SecretService + 'static) -> Self {
        self.services.push(Arc::new(service));
        self
    }
}

impl SecretService for ChainedSecretService {
    fn get(&self, name: &str) -> Option<SecretString> {
        self.services.iter().find_map(|service| service.get(name))
    }
}
