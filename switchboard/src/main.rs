#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use args::{Args, Command};
use clap::Parser;
use switchboard_config::Config;
use switchboard_llm::{
    BlockDelta, ChainedSecretService, ChatMessage, ChatRequest, EnvSecretService, Gateway, LlmError, StreamEvent,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    switchboard_telemetry::init(Some(&config.logging), "warn")?;

    tracing::debug!(config_path = %args.config.display(), "loaded configuration");

    let secrets = ChainedSecretService::new().then(EnvSecretService);
    let gateway = Gateway::from_config(&config, Arc::new(secrets)).context("failed to initialize providers")?;

    match args.command {
        Command::Providers => list_providers(&gateway),
        Command::Models { provider } => {
            for model in gateway.provider(&provider)?.list_models().await {
                println!("{model}");
            }
        }
        Command::Chat {
            provider,
            prompt,
            stream,
            system,
            model,
            max_tokens,
            fallback,
        } => {
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            let mut request = ChatRequest::new(vec![ChatMessage::user(prompt)]).with_cancel(cancel);
            if let Some(system) = system {
                request = request.with_system(system);
            }
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(max_tokens) = max_tokens {
                request = request.with_max_tokens(max_tokens);
            }

            chat(&gateway, &provider, &request, stream, fallback).await?;
        }
    }

    Ok(())
}

fn list_providers(gateway: &Gateway) {
    for provider in gateway.providers() {
        let caps = provider.capabilities();
        println!(
            "{name}\t{kind}\t{status}\tcontext={context}\toutput={output}\tvision={vision}",
            name = provider.name(),
            kind = provider.kind(),
            status = if provider.is_available() {
                "ready"
            } else {
                "no-credential"
            },
            context = caps.max_context_tokens,
            output = caps.max_output_tokens,
            vision = caps.vision,
        );
    }
}

async fn chat(gateway: &Gateway, provider: &str, request: &ChatRequest, stream: bool, fallback: bool) -> anyhow::Result<()> {
    let result = if stream {
        let mut stdout = std::io::stdout();
        let mut on_event = |event: StreamEvent| {
            if let StreamEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
                ..
            } = event
            {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
        };
        gateway.chat_stream(provider, request, &mut on_event).await
    } else if fallback {
        gateway.chat_with_fallback(provider, request).await
    } else {
        gateway.chat(provider, request).await
    };

    let response = match result {
        Ok(response) => response,
        Err(LlmError::Cancelled) => {
            eprintln!("\ncancelled");
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("chat with '{provider}' failed")),
    };

    if stream {
        println!();
    } else {
        println!("{}", response.text());
    }

    for (id, name, input) in response.tool_calls() {
        println!("[tool call {id}] {name}({input})");
    }

    let usage = response
        .usage
        .map(|u| format!(", {} in / {} out", u.input_tokens, u.output_tokens))
        .unwrap_or_default();
    eprintln!("({:?}{usage})", response.stop_reason);

    Ok(())
}

/// Cancel the in-flight call on Ctrl+C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("interrupt received, cancelling");
            cancel.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "failed to install Ctrl+C handler"),
    }
}
