//! Explicit provider registry
//!
//! Maps each vendor kind to a constructor. Populated once at startup by
//! [`ProviderRegistry::with_builtin`]; tests may register their own.

use std::collections::HashMap;
use std::sync::Arc;

use switchboard_config::{ProviderConfig, ProviderKind};

use crate::error::LlmError;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::google::GoogleProvider;
use crate::provider::ollama::OllamaProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{Provider, ProviderDeps};

/// Builds one adapter from its name and configuration
pub type ProviderConstructor =
    Arc<dyn Fn(&str, &ProviderConfig, ProviderDeps) -> Result<Arc<dyn Provider>, LlmError> + Send + Sync>;

/// Constructor map keyed by vendor kind
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<ProviderKind, ProviderConstructor>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the four built-in adapters
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(ProviderKind::Anthropic, |name, config, deps| {
                AnthropicProvider::new(name, config, deps).map(|p| Arc::new(p) as Arc<dyn Provider>)
            })
            .register(ProviderKind::Openai, |name, config, deps| {
                OpenAiProvider::new(name, config, deps).map(|p| Arc::new(p) as Arc<dyn Provider>)
            })
            .register(ProviderKind::Google, |name, config, deps| {
                GoogleProvider::new(name, config, deps).map(|p| Arc::new(p) as Arc<dyn Provider>)
            })
            .register(ProviderKind::Ollama, |name, config, deps| {
                OllamaProvider::new(name, config, deps).map(|p| Arc::new(p) as Arc<dyn Provider>)
            });
        registry
    }

    /// Register or replace the constructor for a kind
    pub fn register<F>(&mut self, kind: ProviderKind, constructor: F) -> &mut Self
    where
        F: Fn(&str, &ProviderConfig, ProviderDeps) -> Result<Arc<dyn Provider>, LlmError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    /// Whether a constructor is registered for `kind`
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Construct an adapter
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ProviderNotFound` when no constructor is
    /// registered for the configured kind, or the constructor's error
    pub fn build(&self, name: &str, config: &ProviderConfig, deps: ProviderDeps) -> Result<Arc<dyn Provider>, LlmError> {
        let kind = config.kind();
        let constructor = self.constructors.get(&kind).ok_or_else(|| LlmError::ProviderNotFound {
            provider: kind.to_string(),
        })?;

        let provider = constructor(name, config, deps)?;
        tracing::debug!(provider = %name, kind = %kind, "constructed provider");
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaticModelRegistry;
    use crate::secrets::StaticSecretService;

    fn deps() -> ProviderDeps {
        ProviderDeps::new(
            Arc::new(StaticSecretService::new()),
            Arc::new(StaticModelRegistry::empty()),
        )
    }

    #[test]
    fn builtin_covers_every_kind() {
        let registry = ProviderRegistry::with_builtin();

        for kind in ProviderKind::ALL {
            assert!(registry.contains(kind));
            let provider = registry.build("p", &ProviderConfig::new(kind), deps()).unwrap();
            assert_eq!(provider.kind(), kind);
            assert_eq!(provider.name(), "p");
        }
    }

    #[test]
    fn empty_registry_reports_missing_kind() {
        let err = ProviderRegistry::new()
            .build("local", &ProviderConfig::new(ProviderKind::Ollama), deps())
            .err()
            .unwrap();

        assert!(matches!(err, LlmError::ProviderNotFound { ref provider } if provider == "ollama"));
    }

    #[test]
    fn custom_constructor_replaces_builtin() {
        let mut registry = ProviderRegistry::with_builtin();
        registry.register(ProviderKind::Ollama, |name, _, _| {
            Err(LlmError::InvalidRequest(format!("{name} disabled")))
        });

        let err = registry
            .build("local", &ProviderConfig::new(ProviderKind::Ollama), deps())
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::InvalidRequest(ref msg) if msg == "local disabled"));
    }
}
