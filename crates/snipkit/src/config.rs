//! snipkit.toml loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use snipkit_render::SandboxLimits;
use snipkit_sanitize::CompletionConfig;
use snipkit_server::ServerConfig;

/// Configuration file structure (snipkit.toml). Every section and field is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub sandbox: SandboxLimits,
}

/// Load `path` if it exists, defaults otherwise.
/// Returns an error if the file exists but is malformed.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("{} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub const DEFAULT_CONFIG: &str = r#"# snipkit configuration

[server]
host = "127.0.0.1"
port = 3000

[completion]
# OpenAI-compatible chat completions endpoint
base_url = "https://openrouter.ai/api/v1"
model = "openai/gpt-3.5-turbo"
# Environment variable holding the API key
api_key_env = "OPENROUTER_API_KEY"
timeout_secs = 60

[sandbox]
# Budgets for rendering untrusted snippets
max_steps = 1000000
max_call_depth = 64
max_elements = 5000
timeout_ms = 2000
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_matches_defaults() {
        assert_eq!(parse(DEFAULT_CONFIG).unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config = parse("[server]\nport = 8080\n\n[sandbox]\nmax_steps = 10\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.sandbox.max_steps, 10);
        assert_eq!(config.sandbox.timeout_ms, SandboxLimits::default().timeout_ms);
        assert_eq!(config.completion, CompletionConfig::default());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load(&dir.path().join("snipkit.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snipkit.toml");
        fs::write(&path, "[server\nport = ").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
