use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Switchboard chat gateway
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Talk to Anthropic, OpenAI, Google, and Ollama through one interface")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured providers and whether they have credentials
    Providers,

    /// List the models a provider can serve
    Models {
        /// Provider name from the configuration
        provider: String,
    },

    /// Send one prompt and print the reply
    Chat {
        /// Provider name from the configuration
        provider: String,

        /// User message
        prompt: String,

        /// Print text as it streams in
        #[arg(long)]
        stream: bool,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Output token cap
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Retry once with the registry's fallback model if the model is unknown
        #[arg(long, conflicts_with = "stream")]
        fallback: bool,
    },
}
