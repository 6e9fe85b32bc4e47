use std::path::Path;

use crate::{Config, ProviderKind};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(providers = config.providers.len(), "configuration loaded");

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, the retry policy
    /// is unusable, or a provider is misconfigured
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_gateway()?;
        self.validate_providers()?;
        Ok(())
    }

    fn validate_gateway(&self) -> anyhow::Result<()> {
        if self.gateway.max_attempts == 0 {
            anyhow::bail!("gateway.max_attempts must be at least 1");
        }

        if self.gateway.initial_backoff > self.gateway.max_backoff {
            anyhow::bail!("gateway.initial_backoff must not exceed gateway.max_backoff");
        }

        if self.gateway.request_timeout.is_zero() {
            anyhow::bail!("gateway.request_timeout must be greater than zero");
        }

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured under [providers.<name>]");
        }

        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                anyhow::bail!("provider names must not be empty");
            }

            if provider.kind() == ProviderKind::Ollama && provider.api_key.is_some() {
                anyhow::bail!("provider '{name}': the ollama daemon does not take an api_key");
            }

            if provider.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                anyhow::bail!("provider '{name}': model must not be empty when set");
            }
        }

        Ok(())
    }
}
