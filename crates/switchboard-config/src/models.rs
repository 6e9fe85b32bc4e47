use std::collections::HashMap;

use serde::Deserialize;

/// Known models for one provider kind, used to seed the model registry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelCatalogConfig {
    /// Model used when neither the request nor the provider names one
    #[serde(default)]
    pub default: Option<String>,
    /// Model identifiers reported when live discovery fails
    #[serde(default)]
    pub ids: Vec<String>,
    /// Same-provider replacement for a model the vendor no longer serves
    #[serde(default)]
    pub fallbacks: HashMap<String, String>,
}
