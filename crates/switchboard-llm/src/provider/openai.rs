//! OpenAI-compatible provider implementation

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::{OpenAiOptions, ProviderConfig, ProviderKind, ProviderOptions};
use tokio_util::sync::CancellationToken;

use super::{AdapterCore, Provider, ProviderCapabilities, ProviderDeps};
use crate::cancel::CallCancellation;
use crate::convert::openai::{OpenAiStreamState, encode_request};
use crate::decode::SseDecoder;
use crate::discovery::discover;
use crate::error::LlmError;
use crate::fetch::read_json;
use crate::protocol::openai::{OpenAiModelList, OpenAiResponse, OpenAiStreamChunk};
use crate::stream::{EventSink, StreamNormalizer, drive};
use crate::types::{AiResponse, ChatRequest};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Host that understands `stream_options`
const CANONICAL_HOST: &str = "api.openai.com";

const DEFAULT_MODEL: &str = "gpt-4o";

const FALLBACK_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "o3-mini"];

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    core: AdapterCore,
    options: OpenAiOptions,
    include_usage: bool,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the configuration is for
    /// another vendor
    pub fn new(name: impl Into<String>, config: &ProviderConfig, deps: ProviderDeps) -> Result<Self, LlmError> {
        let name = name.into();
        let ProviderOptions::Openai(options) = &config.options else {
            return Err(LlmError::InvalidRequest(format!(
                "provider '{name}' is configured as {}, not openai",
                config.kind()
            )));
        };

        let core = AdapterCore::new(name, config, DEFAULT_BASE_URL, deps);
        // Compatible third-party servers often reject unknown fields
        let include_usage = options.include_usage || core.base_host().as_deref() == Some(CANONICAL_HOST);

        Ok(Self {
            core,
            options: options.clone(),
            include_usage,
        })
    }

    fn authorize(&self, builder: RequestBuilder, api_key: &SecretString) -> RequestBuilder {
        let builder = builder.bearer_auth(api_key.expose_secret());
        match &self.options.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    async fn send_completion(
        &self,
        request: &ChatRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<Response, LlmError> {
        request.validate()?;
        let api_key = self.core.credential()?;
        let model = self.core.resolve_model(request, DEFAULT_MODEL);
        let body = encode_request(request, &model, stream, self.include_usage);

        tracing::debug!(provider = %self.core.name(), model = %model, stream, "sending chat completion request");

        self.core
            .send(cancel, || {
                self.authorize(self.core.client().post(self.core.url("/chat/completions")), &api_key)
                    .json(&body)
            })
            .await
    }

    async fn complete(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<AiResponse, LlmError> {
        let response = self.send_completion(request, false, cancel).await?;
        let wire: OpenAiResponse = read_json(self.core.name(), response, cancel).await?;
        Ok(wire.into())
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> Result<AiResponse, LlmError> {
        let response = self.send_completion(request, true, cancel).await?;
        let source = SseDecoder::<_, OpenAiStreamChunk>::new(response.bytes_stream());
        let mut state = OpenAiStreamState::new();

        drive(
            StreamNormalizer::new(self.core.name()),
            source,
            cancel,
            on_event,
            |chunk, n| state.apply(chunk, n),
        )
        .await
    }

    async fn fetch_models(&self) -> Result<Vec<String>, LlmError> {
        let api_key = self.core.credential()?;
        let cancel = CancellationToken::new();

        let response = self
            .core
            .send(&cancel, || {
                self.authorize(self.core.client().get(self.core.url("/models")), &api_key)
            })
            .await?;
        let list: OpenAiModelList = read_json(self.core.name(), response, &cancel).await?;

        let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            streaming: true,
            vision: true,
            system_messages: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        }
    }

    fn is_available(&self) -> bool {
        self.core.has_credential()
    }

    fn model_for(&self, request: &ChatRequest) -> String {
        self.core.resolve_model(request, DEFAULT_MODEL)
    }

    async fn list_models(&self) -> Vec<String> {
        discover(
            self.core.name(),
            self.core.kind(),
            self.core.models(),
            self.fetch_models(),
            FALLBACK_MODELS,
        )
        .await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<AiResponse, LlmError> {
        let call = CallCancellation::merge(&request.cancel);
        let response = self.core.observe(&call, self.complete(request, call.token()).await)?;
        self.core.report_dropped(&response);
        Ok(response)
    }

    async fn chat_stream(&self, request: &ChatRequest, on_event: EventSink<'_>) -> Result<AiResponse, LlmError> {
        let call = CallCancellation::merge(&request.cancel);
        let result = self.complete_stream(request, call.token(), on_event).await;
        self.core.observe(&call, result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_config::ModelCatalogConfig;

    use super::*;
    use crate::models::StaticModelRegistry;
    use crate::secrets::StaticSecretService;
    use crate::types::ChatMessage;

    fn deps(registry: StaticModelRegistry) -> ProviderDeps {
        ProviderDeps::new(Arc::new(StaticSecretService::new()), Arc::new(registry))
    }

    #[test]
    fn usage_option_only_on_canonical_host() {
        let canonical = OpenAiProvider::new(
            "openai",
            &ProviderConfig::new(ProviderKind::Openai),
            deps(StaticModelRegistry::empty()),
        )
        .unwrap();
        assert!(canonical.include_usage);

        let compatible = ProviderConfig::new(ProviderKind::Openai).with_base_url("http://localhost:8000/v1".parse().unwrap());
        let compatible = OpenAiProvider::new("vllm", &compatible, deps(StaticModelRegistry::empty())).unwrap();
        assert!(!compatible.include_usage);
    }

    #[test]
    fn model_resolution_order() {
        let registry = StaticModelRegistry::empty().with_catalog(
            ProviderKind::Openai,
            ModelCatalogConfig {
                default: Some("gpt-registry".to_owned()),
                ..ModelCatalogConfig::default()
            },
        );
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);

        let bare = OpenAiProvider::new(
            "openai",
            &ProviderConfig::new(ProviderKind::Openai),
            deps(StaticModelRegistry::empty()),
        )
        .unwrap();
        assert_eq!(bare.core.resolve_model(&request, DEFAULT_MODEL), "gpt-4o");

        let with_registry =
            OpenAiProvider::new("openai", &ProviderConfig::new(ProviderKind::Openai), deps(registry.clone())).unwrap();
        assert_eq!(with_registry.core.resolve_model(&request, DEFAULT_MODEL), "gpt-registry");

        let configured = OpenAiProvider::new(
            "openai",
            &ProviderConfig::new(ProviderKind::Openai).with_model("gpt-config"),
            deps(registry),
        )
        .unwrap();
        assert_eq!(configured.core.resolve_model(&request, DEFAULT_MODEL), "gpt-config");
        assert_eq!(
            configured
                .core
                .resolve_model(&request.clone().with_model("gpt-override"), DEFAULT_MODEL),
            "gpt-override"
        );
    }
}
