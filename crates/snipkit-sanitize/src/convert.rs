//! Framework-to-framework conversion.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::{ChatMessage, CompletionClient, CompletionError};
use crate::prompt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("code is missing or empty")]
    InvalidInput,

    #[error("conversion failed: {0}")]
    ConversionFailed(#[from] CompletionError),

    #[error("converter returned no code")]
    EmptyOutput,
}

/// Ports component source from one framework to another with a single
/// completion request. Access control is the caller's job.
#[derive(Clone)]
pub struct FrameworkConverter {
    client: Arc<dyn CompletionClient>,
}

impl FrameworkConverter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Convert `code` written for `from` into `to`.
    ///
    /// Equal framework tags return `code` unchanged without a request.
    pub async fn convert(&self, code: &str, from: &str, to: &str) -> Result<String, ConvertError> {
        if code.trim().is_empty() || from.trim().is_empty() || to.trim().is_empty() {
            return Err(ConvertError::InvalidInput);
        }
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Ok(code.to_string());
        }

        let converted = self
            .client
            .complete(vec![ChatMessage::user(prompt::convert(from, to, code))])
            .await
            .inspect_err(|e| warn!(error = %e, from, to, "framework conversion failed"))?;

        match converted {
            Some(code) if !code.trim().is_empty() => {
                info!(from, to, bytes = code.len(), "converted component");
                Ok(code)
            }
            _ => Err(ConvertError::EmptyOutput),
        }
    }
}
