use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Retry and timeout policy applied to every outbound vendor call
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Timeout for a single attempt, including reading the response head
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Total attempts for transient network failures (1 disables retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt
    #[serde(default = "default_initial_backoff", deserialize_with = "deserialize_duration")]
    pub initial_backoff: Duration,
    /// Upper bound for the backoff delay
    #[serde(default = "default_max_backoff", deserialize_with = "deserialize_duration")]
    pub max_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff() -> Duration {
    Duration::from_millis(250)
}

const fn default_max_backoff() -> Duration {
    Duration::from_secs(4)
}

/// Parse human durations such as `"250ms"` or `"2m"`
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}
