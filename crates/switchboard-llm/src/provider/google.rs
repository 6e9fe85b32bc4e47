//! Google Generative Language API provider implementation

use async_trait::async_trait;
use reqwest::Response;
use secrecy::ExposeSecret;
use switchboard_config::{ProviderConfig, ProviderKind, ProviderOptions};
use tokio_util::sync::CancellationToken;

use super::{AdapterCore, Provider, ProviderCapabilities, ProviderDeps};
use crate::cancel::CallCancellation;
use crate::convert::google::{GoogleStreamState, encode_request};
use crate::decode::SseDecoder;
use crate::discovery::discover;
use crate::error::LlmError;
use crate::fetch::read_json;
use crate::protocol::google::{GoogleModelList, GoogleResponse};
use crate::stream::{EventSink, StreamNormalizer, drive};
use crate::types::{AiResponse, ChatRequest};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Google Generative Language API provider
pub struct GoogleProvider {
    core: AdapterCore,
}

impl GoogleProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the configuration is for
    /// another vendor
    pub fn new(name: impl Into<String>, config: &ProviderConfig, deps: ProviderDeps) -> Result<Self, LlmError> {
        let name = name.into();
        if !matches!(config.options, ProviderOptions::Google(_)) {
            return Err(LlmError::InvalidRequest(format!(
                "provider '{name}' is configured as {}, not google",
                config.kind()
            )));
        }

        Ok(Self {
            core: AdapterCore::new(name, config, DEFAULT_BASE_URL, deps),
        })
    }

    async fn send_generate(
        &self,
        request: &ChatRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<Response, LlmError> {
        request.validate()?;
        let api_key = self.core.credential()?;
        let model = self.core.resolve_model(request, DEFAULT_MODEL);
        let body = encode_request(request);

        let method = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        let url = self.core.url(&format!("/models/{model}:{method}"));

        tracing::debug!(provider = %self.core.name(), model = %model, stream, "sending generate request");

        self.core
            .send(cancel, || {
                let builder = self
                    .core
                    .client()
                    .post(&url)
                    .query(&[("key", api_key.expose_secret())]);
                let builder = if stream {
                    builder.query(&[("alt", "sse")])
                } else {
                    builder
                };
                builder.json(&body)
            })
            .await
    }

    async fn complete(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<AiResponse, LlmError> {
        let response = self.send_generate(request, false, cancel).await?;
        let wire: GoogleResponse = read_json(self.core.name(), response, cancel).await?;
        Ok(wire.into())
    }

    async fn complete_stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
        on_event: EventSink<'_>,
    ) -> Result<AiResponse, LlmError> {
        let response = self.send_generate(request, true, cancel).await?;
        let source = SseDecoder::<_, GoogleResponse>::new(response.bytes_stream());
        let mut state = GoogleStreamState::new();

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
        let url = self.core.url("/models");

        let response = self
            .core
            .send(&cancel, || {
                self.core
                    .client()
                    .get(&url)
                    .query(&[("key", api_key.expose_secret()), ("pageSize", "1000")])
            })
            .await?;
        let list: GoogleModelList = read_json(self.core.name(), response, &cancel).await?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                m.name
                    .strip_prefix("models/")
                    .map_or_else(|| m.name.clone(), str::to_owned)
            })
            .collect())
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            streaming: true,
            vision: true,
            system_messages: true,
            max_context_tokens: 1_048_576,
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
