//! Model list discovery with graceful degradation
//!
//! Live vendor listing is preferred. When it fails or comes back empty
//! the model registry's known ids are used, and only when those are
//! empty too does the adapter's built-in list apply.

use std::future::Future;

use switchboard_config::ProviderKind;

use crate::error::LlmError;
use crate::models::ModelRegistry;

/// Where a model list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// The vendor's list endpoint
    Live,
    /// The model registry
    Registry,
    /// The adapter's built-in list
    BuiltIn,
}

/// Resolve a model list, never failing
pub async fn discover<Fut>(
    provider: &str,
    kind: ProviderKind,
    registry: &dyn ModelRegistry,
    live: Fut,
    built_in: &[&str],
) -> Vec<String>
where
    Fut: Future<Output = Result<Vec<String>, LlmError>>,
{
    let (models, source) = resolve(provider, kind, registry, live, built_in).await;
    tracing::debug!(provider, ?source, count = models.len(), "resolved model list");
    models
}

async fn resolve<Fut>(
    provider: &str,
    kind: ProviderKind,
    registry: &dyn ModelRegistry,
    live: Fut,
    built_in: &[&str],
) -> (Vec<String>, ModelSource)
where
    Fut: Future<Output = Result<Vec<String>, LlmError>>,
{
    match live.await {
        Ok(models) if !models.is_empty() => return (models, ModelSource::Live),
        Ok(_) => {
            tracing::debug!(provider, "vendor reported no models");
        }
        Err(e @ LlmError::MissingCredential { .. }) => {
            tracing::debug!(provider, error = %e, "skipping live model discovery");
        }
        Err(e) => {
            tracing::warn!(provider, error = %e, "failed to discover models");
        }
    }

    let known = registry.model_ids(kind);
    if !known.is_empty() {
        return (known, ModelSource::Registry);
    }

    (
        built_in.iter().map(|id| (*id).to_owned()).collect(),
        ModelSource::BuiltIn,
    )
}
