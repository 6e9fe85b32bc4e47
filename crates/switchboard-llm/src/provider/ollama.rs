//! Ollama local daemon provider implementation

use async_trait::async_trait;
use reqwest::Response;
use switchboard_config::{OllamaOptions, ProviderConfig, ProviderKind, ProviderOptions};
use tokio_util::sync::CancellationToken;

use super::{AdapterCore, Provider, ProviderCapabilities, ProviderDeps};
use crate::cancel::CallCancellation;
use crate::convert::ollama::{OllamaStreamState, encode_request};
use crate::decode::NdjsonDecoder;
use crate::discovery::discover;
use crate::error::LlmError;
use crate::fetch::read_json;
use crate::protocol::ollama::{OllamaResponse, OllamaTagList};
use crate::stream::{EventSink, StreamNormalizer, drive};
use crate::types::{AiResponse, ChatRequest};

/// Default daemon address
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const DEFAULT_MODEL: &str = "llama3.2";

const FALLBACK_MODELS: &[&str] = &["llama3.2", "llama3.1", "qwen2.5", "mistral", "gemma2"];

/// Ollama provider; needs no credential
pub struct OllamaProvider {
    core: AdapterCore,
    options: OllamaOptions,
}

impl OllamaProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the configuration is for
    /// another vendor
    pub fn new(name: impl Into<String>, config: &ProviderConfig, deps: ProviderDeps) -> Result<Self, LlmError> {
        let name = name.into();
        let ProviderOptions::Ollama(options) = &config.options else {
            return Err(LlmError::InvalidRequest(format!(
                "provider '{name}' is configured as {}, not ollama",
                config.kind()
            )));
        };

        Ok(Self {
            options: options.clone(),
            core: AdapterCore::new(name, config, DEFAULT_BASE_URL, deps),
        })
    }

    async fn send_chat(&self, request: &ChatRequest, stream: bool, cancel: &CancellationToken) -> Result<Response, LlmError> {
        request.validate()?;
        let model = self.core.resolve_model(request, DEFAULT_MODEL);
        let body = encode_request(request, &model, stream, &self.options);

        tracing::debug!(provider = %self.core.name(), model = %model, stream, "sending chat request");

        self.core
            .send(cancel, || self.core.client().post(self.core.url("/api/chat")).json(&body))
            .await
    }

    async fn complete(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<AiResponse, LlmError> {
        let response = self.send_chat(request, false, cancel).await?;
        let wire: OllamaResponse = read_json(self.core.name(), response, cancel).await?;

        if let Some(error) = wire.error {
            return Err(LlmError::StreamVendor {
                provider: self.core.name().to_owned(),
                error_type: "ollama_error".to_owned(),
                message: error,
            });
        }

        Ok(wire.into())
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> Result<AiResponse, LlmError> {
        let response = self.send_chat(request, true, cancel).await?;
        let source = NdjsonDecoder::<_, OllamaResponse>::new(response.bytes_stream());
        let mut state = OllamaStreamState::new();

        drive(
            StreamNormalizer::new(self.core.name()),
            source,
            cancel,
            on_event,
            |line, n| state.apply(line, n),
        )
        .await
    }

    async fn fetch_models(&self) -> Result<Vec<String>, LlmError> {
        let cancel = CancellationToken::new();
        let response = self
            .core
            .send(&cancel, || self.core.client().get(self.core.url("/api/tags")))
            .await?;
        let tags: OllamaTagList = read_json(self.core.name(), response, &cancel).await?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            streaming: true,
            vision: false,
            system_messages: true,
            max_context_tokens: 32_768,
            max_output_tokens: 4096,
        }
    }

    fn is_available(&self) -> bool {
        true
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
        self.core.observe(&call, self.complete(request, call.token()).await)
    }

    async fn chat_stream(&self, request: &ChatRequest, on_event: EventSink<'_>) -> Result<AiResponse, LlmError> {
        let call = CallCancellation::merge(&request.cancel);
        let result = self.complete_stream(request, call.token(), on_event).await;
        self.core.observe(&call, result)
    }
}
