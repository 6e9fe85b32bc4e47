//! Anthropic Messages API provider implementation

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use switchboard_config::{AnthropicOptions, ProviderConfig, ProviderKind, ProviderOptions};
use tokio_util::sync::CancellationToken;

use super::{AdapterCore, Provider, ProviderCapabilities, ProviderDeps};
use crate::cancel::CallCancellation;
use crate::convert::anthropic::{AnthropicStreamState, encode_request};
use crate::decode::SseDecoder;
use crate::discovery::discover;
use crate::error::LlmError;
use crate::fetch::read_json;
use crate::protocol::anthropic::{AnthropicModelList, AnthropicResponse, AnthropicStreamEvent};
use crate::stream::{EventSink, StreamNormalizer, drive};
use crate::types::{AiResponse, ChatRequest};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when nothing else names one
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Reported when neither the vendor nor the registry lists models
const FALLBACK_MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-7-sonnet-20250219",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    core: AdapterCore,
    options: AnthropicOptions,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the configuration is for
    /// another vendor
    pub fn new(name: impl Into<String>, config: &ProviderConfig, deps: ProviderDeps) -> Result<Self, LlmError> {
        let name = name.into();
        let ProviderOptions::Anthropic(options) = &config.options else {
            return Err(LlmError::InvalidRequest(format!(
                "provider '{name}' is configured as {}, not anthropic",
                config.kind()
            )));
        };

        Ok(Self {
            options: options.clone(),
            core: AdapterCore::new(name, config, DEFAULT_BASE_URL, deps),
        })
    }

    /// Attach auth and version headers
    fn authorize(&self, builder: RequestBuilder, api_key: &SecretString) -> RequestBuilder {
        let version = self.options.api_version.as_deref().unwrap_or(ANTHROPIC_VERSION);
        let builder = builder
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", version);

        match &self.options.beta {
            Some(beta) => builder.header("anthropic-beta", beta),
            None => builder,
        }
    }

    /// Validate, encode, and send a messages request
    async fn send_messages(
        &self,
        request: &ChatRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<Response, LlmError> {
        request.validate()?;
        let api_key = self.core.credential()?;
        let model = self.core.resolve_model(request, DEFAULT_MODEL);
        let body = encode_request(request, &model, stream);

        tracing::debug!(provider = %self.core.name(), model = %model, stream, "sending messages request");

        self.core
            .send(cancel, || {
                self.authorize(self.core.client().post(self.core.url("/messages")), &api_key)
                    .json(&body)
            })
            .await
    }

    async fn complete(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<AiResponse, LlmError> {
        let response = self.send_messages(request, false, cancel).await?;
        let wire: AnthropicResponse = read_json(self.core.name(), response, cancel).await?;
        Ok(wire.into())
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> Result<AiResponse, LlmError> {
        let response = self.send_messages(request, true, cancel).await?;
        let source = SseDecoder::<_, AnthropicStreamEvent>::new(response.bytes_stream());
        let mut state = AnthropicStreamState::new();

        drive(
            StreamNormalizer::new(self.core.name()),
            source,
            cancel,
            on_event,
            |event, n| state.apply(event, n),
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
                    .query(&[("limit", "1000")])
            })
            .await?;
        let list: AnthropicModelList = read_json(self.core.name(), response, &cancel).await?;

        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            streaming: true,
            vision: true,
            system_messages: true,
            max_context_tokens: 200_000,
            max_output_tokens: 8192,
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
