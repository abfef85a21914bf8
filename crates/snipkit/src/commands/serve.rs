//! API server command.

use std::sync::Arc;

use anyhow::{Context, Result};
use snipkit_catalog::MemoryStore;
use snipkit_render::SandboxedInterpreter;
use snipkit_sanitize::HttpCompletionClient;
use snipkit_server::{AppState, Server};

use crate::config::Config;

/// Run the server until interrupted.
pub async fn run(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server;
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(port) = port {
        server_config.port = port;
    }

    if std::env::var(&config.completion.api_key_env).is_err() {
        tracing::warn!(
            "{} is not set; completion requests will be unauthenticated",
            config.completion.api_key_env
        );
    }
    let client =
        HttpCompletionClient::new(&config.completion).context("Failed to build completion client")?;

    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(client),
        Arc::new(SandboxedInterpreter::new(config.sandbox)),
    )?;

    Server::new(server_config, state).start().await?;

    Ok(())
}
