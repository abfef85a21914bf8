//! One-off snippet sanitization.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use snipkit_sanitize::{HttpCompletionClient, SanitizationService};

use crate::config::Config;

/// Sanitize `file` and print or write the rewritten component.
pub async fn run(config: &Config, file: &Path, output: Option<&Path>) -> Result<()> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let client =
        HttpCompletionClient::new(&config.completion).context("Failed to build completion client")?;
    let service = SanitizationService::new(Arc::new(client));

    let sanitized = service
        .sanitize(&code)
        .await
        .with_context(|| format!("Failed to sanitize {}", file.display()))?;
    tracing::info!("Detected language: {}", sanitized.language);

    match output {
        Some(path) => {
            fs::write(path, &sanitized.code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{}", sanitized.code),
    }

    Ok(())
}
