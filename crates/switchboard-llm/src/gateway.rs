//! Gateway facade over the configured providers

use std::sync::Arc;

use indexmap::IndexMap;
use switchboard_config::Config;

use crate::error::LlmError;
use crate::fetch::RetryPolicy;
use crate::models::{ModelRegistry, StaticModelRegistry};
use crate::provider::{Provider, ProviderDeps};
use crate::registry::ProviderRegistry;
use crate::secrets::SecretService;
use crate::stream::EventSink;
use crate::types::{AiResponse, ChatRequest};

/// Every configured provider, addressable by name
pub struct Gateway {
    providers: IndexMap<String, Arc<dyn Provider>>,
    models: Arc<dyn ModelRegistry>,
}

impl Gateway {
    /// Build all configured providers with the built-in adapters
    ///
    /// # Errors
    ///
    /// Returns the first provider construction error
    pub fn from_config(config: &Config, secrets: Arc<dyn SecretService>) -> Result<Self, LlmError> {
        Self::with_registry(config, secrets, &ProviderRegistry::with_builtin())
    }

    /// Build all configured providers through `registry`
    ///
    /// # Errors
    ///
    /// Returns the first provider construction error
    pub fn with_registry(
        config: &Config,
        secrets: Arc<dyn SecretService>,
        registry: &ProviderRegistry,
    ) -> Result<Self, LlmError> {
        let models: Arc<dyn ModelRegistry> = Arc::new(StaticModelRegistry::from_config(&config.models));
        let deps = ProviderDeps::new(secrets, Arc::clone(&models)).with_retry(RetryPolicy::from(&config.gateway));

        let mut providers = IndexMap::with_capacity(config.providers.len());
        for (name, provider_config) in &config.providers {
            let provider = registry.build(name, provider_config, deps.clone())?;
            if !provider.is_available() {
                tracing::warn!(provider = %name, kind = %provider.kind(), "no credential configured");
            }
            providers.insert(name.clone(), provider);
        }

        tracing::info!(count = providers.len(), "gateway initialized");

        Ok(Self { providers, models })
    }

    /// Look up a provider by name
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ProviderNotFound` if no provider has that name
    pub fn provider(&self, name: &str) -> Result<&Arc<dyn Provider>, LlmError> {
        self.providers.get(name).ok_or_else(|| LlmError::ProviderNotFound {
            provider: name.to_owned(),
        })
    }

    /// All providers in configuration order
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    /// Blocking chat against a named provider
    pub async fn chat(&self, name: &str, request: &ChatRequest) -> Result<AiResponse, LlmError> {
        self.provider(name)?.chat(request).await
    }

    /// Streaming chat against a named provider
    pub async fn chat_stream(
        &self,
        name: &str,
        request: &ChatRequest,
        on_event: EventSink<'_>,
    ) -> Result<AiResponse, LlmError> {
        self.provider(name)?.chat_stream(request, on_event).await
    }

    /// Blocking chat that retries once on a same-provider fallback model
    /// when the vendor reports the model as not found
    pub async fn chat_with_fallback(&self, name: &str, request: &ChatRequest) -> Result<AiResponse, LlmError> {
        let provider = self.provider(name)?;

        let err = match provider.chat(request).await {
            Err(err) if err.is_not_found() => err,
            other => return other,
        };

        let failed = provider.model_for(request);
        let Some(fallback) = self.models.fallback_model_id(provider.kind(), &failed) else {
            return Err(err);
        };

        tracing::warn!(
            provider = %name,
            model = %failed,
            fallback = %fallback,
            "model not found, retrying with fallback"
        );

        provider.chat(&request.clone().with_model(fallback)).await
    }
}
