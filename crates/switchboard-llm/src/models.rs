//! Model registry seam
//!
//! Supplies per-provider defaults, known model ids for discovery
//! fallback, and same-provider replacements for retired models.

use std::collections::HashMap;

use indexmap::IndexMap;
use switchboard_config::{ModelCatalogConfig, ProviderKind};

/// Read-only source of model metadata, shared across concurrent calls
pub trait ModelRegistry: Send + Sync {
    /// Registered default model for a provider kind
    fn default_model_id(&self, kind: ProviderKind) -> Option<String>;

    /// Known model ids for a provider kind
    fn model_ids(&self, kind: ProviderKind) -> Vec<String>;

    /// Replacement for `model` on the same provider, if one is known
    fn fallback_model_id(&self, kind: ProviderKind, model: &str) -> Option<String>;
}

/// Registry backed by the `[models.*]` configuration tables
#[derive(Debug, Clone, Default)]
pub struct StaticModelRegistry {
    catalogs: HashMap<ProviderKind, ModelCatalogConfig>,
}

impl StaticModelRegistry {
    /// A registry that knows nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from configuration
    pub fn from_config(catalogs: &IndexMap<ProviderKind, ModelCatalogConfig>) -> Self {
        Self {
            catalogs: catalogs.iter().map(|(kind, catalog)| (*kind, catalog.clone())).collect(),
        }
    }

    /// Replace the catalog for one provider kind
    #[must_use]
    pub fn with_catalog(mut self, kind: ProviderKind, catalog: ModelCatalogConfig) -> Self {
        self.catalogs.insert(kind, catalog);
        self
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn default_model_id(&self, kind: ProviderKind) -> Option<String> {
        self.catalogs.get(&kind)?.default.clone()
    }

    fn model_ids(&self, kind: ProviderKind) -> Vec<String> {
        self.catalogs.get(&kind).map(|c| c.ids.clone()).unwrap_or_default()
    }

    /// Explicit mapping first, then the provider default unless that is
    /// the model that just failed
    fn fallback_model_id(&self, kind: ProviderKind, model: &str) -> Option<String> {
        let catalog = self.catalogs.get(&kind)?;

        if let Some(replacement) = catalog.fallbacks.get(model) {
            return Some(replacement.clone());
        }

        catalog.default.clone().filter(|default| default != model)
    }
}
