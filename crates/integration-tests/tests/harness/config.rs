//! Programmatic configuration builder for integration tests

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::{Config, GatewayConfig, ModelCatalogConfig, ProviderConfig, ProviderKind};
use switchboard_llm::{Gateway, SecretService, StaticSecretService};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder with a fast retry policy and no providers
    pub fn new() -> Self {
        Self {
            config: Config {
                gateway: GatewayConfig {
                    request_timeout: Duration::from_secs(5),
                    max_attempts: 2,
                    initial_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(5),
                },
                ..Config::default()
            },
        }
    }

    /// Add a provider pointed at `base_url`
    pub fn with_provider(mut self, name: &str, kind: ProviderKind, base_url: &str) -> Self {
        let provider = ProviderConfig::new(kind).with_base_url(base_url.parse().expect("valid URL"));
        self.config.providers.insert(name.to_owned(), provider);
        self
    }

    /// Add a fully specified provider
    pub fn with_provider_config(mut self, name: &str, provider: ProviderConfig) -> Self {
        self.config.providers.insert(name.to_owned(), provider);
        self
    }

    /// Override the per-attempt request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway.request_timeout = timeout;
        self
    }

    /// Seed the model registry for a provider kind
    pub fn with_models(mut self, kind: ProviderKind, catalog: ModelCatalogConfig) -> Self {
        self.config.models.insert(kind, catalog);
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

/// Secrets holding a test key under every vendor's first lookup name
pub fn test_secrets() -> StaticSecretService {
    StaticSecretService::new()
        .with("ANTHROPIC_API_KEY", "test-anthropic-key")
        .with("OPENAI_API_KEY", "test-openai-key")
        .with("GEMINI_API_KEY", "test-gemini-key")
}

/// Build a gateway from a config and secrets
pub fn gateway(config: &Config, secrets: impl SecretService + 'static) -> Gateway {
    Gateway::from_config(config, Arc::new(secrets)).expect("gateway builds")
}
