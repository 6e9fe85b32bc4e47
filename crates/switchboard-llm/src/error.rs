use thiserror::Error;

/// Errors that can occur during a gateway call
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential resolved for a provider that needs one
    #[error("{provider}: missing credential (tried {})", names.join(", "))]
    MissingCredential {
        /// Provider name
        provider: String,
        /// Secret names that were tried
        names: Vec<String>,
    },

    /// Vendor answered with a non-2xx status
    #[error("{provider}: vendor returned HTTP {status}: {body}")]
    VendorHttp {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Response body, capped
        body: String,
    },

    /// Response body or stream record could not be parsed
    #[error("{provider}: failed to decode response: {message}")]
    Decode {
        /// Provider name
        provider: String,
        /// Parser error
        message: String,
    },

    /// Vendor signaled an error inside the stream
    #[error("{provider}: stream error ({error_type}): {message}")]
    StreamVendor {
        /// Provider name
        provider: String,
        /// Vendor error type
        error_type: String,
        /// Vendor error message
        message: String,
    },

    /// The call was cancelled
    #[error("request cancelled")]
    Cancelled,

    /// Network failure that outlived the retry budget
    #[error("{provider}: transport error: {message}")]
    Transport {
        /// Provider name
        provider: String,
        /// Underlying error
        message: String,
    },

    /// Request failed validation before any I/O
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Named provider is not configured or not registered
    #[error("provider not found: {provider}")]
    ProviderNotFound {
        /// Requested provider name or type
        provider: String,
    },
}

impl LlmError {
    /// Whether retrying, possibly against a fallback model, may succeed
    ///
    /// Transport failures, 408/429/5xx, and in-band vendor errors are
    /// transient. Cancellation and client errors are not.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::StreamVendor { .. } => true,
            Self::VendorHttp { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    /// Whether the vendor reported the requested model as unknown
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::VendorHttp { status: 404, .. })
    }

    /// Provider the error originated from, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::MissingCredential { provider, .. }
            | Self::VendorHttp { provider, .. }
            | Self::Decode { provider, .. }
            | Self::StreamVendor { provider, .. }
            | Self::Transport { provider, .. }
            | Self::ProviderNotFound { provider } => Some(provider),
            Self::Cancelled | Self::InvalidRequest(_) => None,
        }
    }

    pub(crate) fn decode(provider: &str, message: impl ToString) -> Self {
        Self::Decode {
            provider: provider.to_owned(),
            message: message.to_string(),
        }
    }

    pub(crate) fn transport(provider: &str, message: impl ToString) -> Self {
        Self::Transport {
            provider: provider.to_owned(),
            message: message.to_string(),
        }
    }
}
