//! Provider trait and the vendor adapters

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::SecretString;
use switchboard_config::{ProviderConfig, ProviderKind};
use tokio_util::sync::CancellationToken;

use crate::cancel::CallCancellation;
use crate::error::LlmError;
use crate::fetch::{RetryPolicy, ensure_success, send_with_retry};
use crate::models::ModelRegistry;
use crate::secrets::SecretService;
use crate::stream::EventSink;
use crate::types::{AiResponse, ChatRequest};

/// Static capabilities of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Accepts tool definitions and emits tool calls
    pub tool_use: bool,
    /// Supports streamed responses
    pub streaming: bool,
    /// Accepts image content
    pub vision: bool,
    /// Accepts a system prompt
    pub system_messages: bool,
    /// Context window of the default model family
    pub max_context_tokens: u32,
    /// Output cap of the default model family
    pub max_output_tokens: u32,
}

/// Trait implemented by each vendor adapter
///
/// Adapters hold no per-call state, so one instance may serve any
/// number of concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Vendor family
    fn kind(&self) -> ProviderKind;

    /// Advertised capabilities, without I/O
    fn capabilities(&self) -> ProviderCapabilities;

    /// Whether a credential is available, without I/O
    fn is_available(&self) -> bool;

    /// Model a request would be sent to
    fn model_for(&self, request: &ChatRequest) -> String;

    /// Models this provider can serve
    ///
    /// Never fails: a failed live call degrades to the model registry,
    /// then to a built-in list.
    async fn list_models(&self) -> Vec<String>;

    /// Send a request and wait for the whole response
    async fn chat(&self, request: &ChatRequest) -> Result<AiResponse, LlmError>;

    /// Send a request, reporting normalized events as they arrive
    ///
    /// Returns the same aggregate response a blocking call would have.
    async fn chat_stream(&self, request: &ChatRequest, on_event: EventSink<'_>) -> Result<AiResponse, LlmError>;
}

/// Shared services handed to every adapter at construction
#[derive(Clone)]
pub struct ProviderDeps {
    /// HTTP client, cloned cheaply between adapters
    pub client: Client,
    /// Credential lookup
    pub secrets: Arc<dyn SecretService>,
    /// Model defaults and fallbacks
    pub models: Arc<dyn ModelRegistry>,
    /// Timeout and retry budget
    pub retry: RetryPolicy,
}

impl ProviderDeps {
    /// Dependencies with a fresh client and the default retry policy
    pub fn new(secrets: Arc<dyn SecretService>, models: Arc<dyn ModelRegistry>) -> Self {
        Self {
            client: Client::new(),
            secrets,
            models,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration and services common to all adapters
pub(crate) struct AdapterCore {
    name: String,
    kind: ProviderKind,
    base_url: String,
    model: Option<String>,
    api_key: Option<SecretString>,
    key_names: Vec<String>,
    deps: ProviderDeps,
}

impl AdapterCore {
    pub(crate) fn new(name: String, config: &ProviderConfig, default_base_url: &str, deps: ProviderDeps) -> Self {
        let base_url = config
            .base_url
            .as_ref()
            .map_or(default_base_url, url::Url::as_str)
            .trim_end_matches('/')
            .to_owned();

        Self {
            name,
            kind: config.kind(),
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            key_names: config.key_names(),
            deps,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub(crate) const fn client(&self) -> &Client {
        &self.deps.client
    }

    pub(crate) fn models(&self) -> &dyn ModelRegistry {
        self.deps.models.as_ref()
    }

    /// `{base_url}{path}`
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn base_host(&self) -> Option<String> {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
    }

    /// Configured key first, then the secret service over the lookup names
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingCredential` when nothing resolves
    pub(crate) fn credential(&self) -> Result<SecretString, LlmError> {
        self.api_key
            .clone()
            .or_else(|| self.deps.secrets.first_of(&self.key_names))
            .ok_or_else(|| LlmError::MissingCredential {
                provider: self.name.clone(),
                names: self.key_names.clone(),
            })
    }

    pub(crate) fn has_credential(&self) -> bool {
        self.credential().is_ok()
    }

    /// Request override, then config, then registry default, then `literal`
    pub(crate) fn resolve_model(&self, request: &ChatRequest, literal: &str) -> String {
        request
            .model
            .clone()
            .or_else(|| self.model.clone())
            .or_else(|| self.deps.models.default_model_id(self.kind))
            .unwrap_or_else(|| literal.to_owned())
    }

    /// Send with retry and turn a non-2xx status into `VendorHttp`
    pub(crate) async fn send<F>(&self, cancel: &CancellationToken, build: F) -> Result<Response, LlmError>
    where
        F: Fn() -> RequestBuilder + Send,
    {
        let response = send_with_retry(&self.name, &self.deps.retry, cancel, build).await?;
        ensure_success(&self.name, &self.deps.retry, cancel, response).await
    }

    /// Log tool calls a blocking decode had to drop
    ///
    /// The stream normalizer logs its own drops as blocks close.
    pub(crate) fn report_dropped(&self, response: &AiResponse) {
        for dropped in &response.dropped_tool_calls {
            tracing::warn!(
                provider = %self.name,
                tool = %dropped.tool_name,
                tool_id = %dropped.tool_id,
                reason = %dropped.reason,
                "dropped tool call with undecodable arguments"
            );
        }
    }

    /// Note which side cancelled a failed call
    pub(crate) fn observe<T>(&self, call: &CallCancellation, result: Result<T, LlmError>) -> Result<T, LlmError> {
        if matches!(result, Err(LlmError::Cancelled)) {
            tracing::debug!(provider = %self.name, source = ?call.source(), "call cancelled");
        }
        result
    }
}
