//! Configuration for the Switchboard chat gateway
//!
//! A single TOML file describes the gateway-wide retry and timeout policy,
//! logging, the configured providers (one typed options block per vendor)
//! and the seed data for the in-process model registry.

#![allow(clippy::must_use_candidate)]

mod env;
pub mod gateway;
pub mod llm;
mod loader;
pub mod logging;
pub mod models;

use indexmap::IndexMap;
use serde::Deserialize;

pub use env::EnvExpansionError;
pub use gateway::GatewayConfig;
pub use llm::*;
pub use logging::{LogFormat, LoggingConfig};
pub use models::ModelCatalogConfig;

/// Top-level Switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Retry and timeout policy shared by every provider
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider configurations keyed by name, in file order
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Known models per provider kind
    #[serde(default)]
    pub models: IndexMap<ProviderKind, ModelCatalogConfig>,
}
