use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Vendor API family spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI-compatible chat completions API
    Openai,
    /// Google Generative Language API
    Google,
    /// Local Ollama daemon
    Ollama,
}

impl ProviderKind {
    /// Every supported kind, in registration order
    pub const ALL: [Self; 4] = [Self::Anthropic, Self::Openai, Self::Google, Self::Ollama];

    /// Stable lowercase identifier
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Openai => "openai",
            Self::Google => "google",
            Self::Ollama => "ollama",
        }
    }

    /// Secret names tried, in order, when no key is configured explicitly
    pub const fn default_key_names(self) -> &'static [&'static str] {
        match self {
            Self::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            Self::Openai => &["OPENAI_API_KEY"],
            Self::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY", "GOOGLE_AI_API_KEY"],
            Self::Ollama => &[],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single provider
///
/// The vendor is selected by the `type` key, which also decides which
/// vendor-specific options are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Vendor and its specific options
    #[serde(flatten)]
    pub options: ProviderOptions,
    /// Model used for every call unless the request overrides it
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Literal API key; takes precedence over the secret service
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Secret names to try instead of the vendor defaults
    #[serde(default)]
    pub api_key_names: Option<Vec<String>>,
}

impl ProviderConfig {
    /// Minimal configuration for a provider kind with default options
    pub fn new(kind: ProviderKind) -> Self {
        let options = match kind {
            ProviderKind::Anthropic => ProviderOptions::Anthropic(AnthropicOptions::default()),
            ProviderKind::Openai => ProviderOptions::Openai(OpenAiOptions::default()),
            ProviderKind::Google => ProviderOptions::Google(GoogleOptions::default()),
            ProviderKind::Ollama => ProviderOptions::Ollama(OllamaOptions::default()),
        };

        Self {
            options,
            model: None,
            base_url: None,
            api_key: None,
            api_key_names: None,
        }
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set a literal API key
    #[must_use]
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(SecretString::from(key));
        self
    }

    /// Vendor kind of this provider
    pub const fn kind(&self) -> ProviderKind {
        self.options.kind()
    }

    /// Secret names to try, falling back to the vendor defaults
    pub fn key_names(&self) -> Vec<String> {
        self.api_key_names.clone().unwrap_or_else(|| {
            self.kind()
                .default_key_names()
                .iter()
                .map(|name| (*name).to_owned())
                .collect()
        })
    }
}

/// Vendor-specific options, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderOptions {
    /// Anthropic Messages API
    Anthropic(AnthropicOptions),
    /// OpenAI-compatible chat completions API
    Openai(OpenAiOptions),
    /// Google Generative Language API
    Google(GoogleOptions),
    /// Local Ollama daemon
    Ollama(OllamaOptions),
}

impl ProviderOptions {
    /// Vendor kind for these options
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Anthropic(_) => ProviderKind::Anthropic,
            Self::Openai(_) => ProviderKind::Openai,
            Self::Google(_) => ProviderKind::Google,
            Self::Ollama(_) => ProviderKind::Ollama,
        }
    }
}

/// Anthropic-specific options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicOptions {
    /// Value of the `anthropic-version` header
    #[serde(default)]
    pub api_version: Option<String>,
    /// Value of the `anthropic-beta` header
    #[serde(default)]
    pub beta: Option<String>,
}

/// OpenAI-specific options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiOptions {
    /// Value of the `OpenAI-Organization` header
    #[serde(default)]
    pub organization: Option<String>,
    /// Request usage in the final stream chunk even on non-canonical hosts
    #[serde(default)]
    pub include_usage: bool,
}

/// Google-specific options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleOptions {}

/// Ollama-specific options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaOptions {
    /// How long the daemon keeps the model loaded (e.g. `"5m"`)
    #[serde(default)]
    pub keep_alive: Option<String>,
    /// Context window override passed as `options.num_ctx`
    #[serde(default)]
    pub num_ctx: Option<u32>,
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn parses_anthropic_provider_with_options() {
        let config: ProviderConfig = toml::from_str(
            r#"
            type = "anthropic"
            model = "claude-sonnet-4-20250514"
            api_key = "sk-ant-test"
            api_version = "2023-06-01"
            "#,
        )
        .unwrap();

        assert_eq!(config.kind(), ProviderKind::Anthropic);
        assert_eq!(config.model.as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(config.api_key.as_ref().map(|k| k.expose_secret().to_owned()).as_deref(), Some("sk-ant-test"));
        let ProviderOptions::Anthropic(options) = &config.options else {
            panic!("expected anthropic options");
        };
        assert_eq!(options.api_version.as_deref(), Some("2023-06-01"));
    }

    #[test]
    fn parses_ollama_options() {
        let config: ProviderConfig = toml::from_str(
            r#"
            type = "ollama"
            base_url = "http://localhost:11434"
            keep_alive = "5m"
            num_ctx = 8192
            "#,
        )
        .unwrap();

        let ProviderOptions::Ollama(options) = &config.options else {
            panic!("expected ollama options");
        };
        assert_eq!(options.keep_alive.as_deref(), Some("5m"));
        assert_eq!(options.num_ctx, Some(8192));
        assert_eq!(config.base_url.unwrap().as_str(), "http://localhost:11434/");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = toml::from_str::<ProviderConfig>("type = \"bedrock\"");
        assert!(result.is_err());
    }

    #[test]
    fn key_names_default_per_vendor() {
        assert_eq!(
            ProviderConfig::new(ProviderKind::Google).key_names(),
            vec!["GEMINI_API_KEY", "GOOGLE_API_KEY", "GOOGLE_AI_API_KEY"]
        );
        assert!(ProviderConfig::new(ProviderKind::Ollama).key_names().is_empty());
    }

    #[test]
    fn key_names_override() {
        let config: ProviderConfig =
            toml::from_str("type = \"openai\"\napi_key_names = [\"AZURE_OPENAI_KEY\"]").unwrap();
        assert_eq!(config.key_names(), vec!["AZURE_OPENAI_KEY"]);
    }
}
