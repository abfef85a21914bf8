//! Trait definitions for snippet executors.

use serde::Serialize;

use crate::element::Node;
use crate::ir::Module;

/// What the executor exposes to a snippet besides the standard library.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Name the UI runtime is bound to (e.g. "React")
    pub runtime_binding: String,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            runtime_binding: "React".to_string(),
        }
    }
}

/// Result of evaluating and mounting a snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedOutput {
    /// Mounted tree
    pub nodes: Vec<Node>,

    /// `nodes` serialized to escaped HTML
    pub html: String,

    /// Captured `console.*` lines
    pub console: Vec<String>,

    /// Effects registered during render; never run
    pub deferred_effects: usize,

    /// Interpreter steps consumed
    pub steps: u64,
}

/// Errors that can occur while executing a snippet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Evaluation(String),

    #[error("exported value is not a valid component")]
    InvalidExport,

    #[error("{0}")]
    ResourceExhausted(String),
}

/// Strategy for running a transpiled snippet.
pub trait SnippetExecutor: Send + Sync {
    /// Executor identifier used in logs (e.g., "sandboxed")
    fn name(&self) -> &'static str;

    /// Evaluate `module` with `capabilities`, take its default export and
    /// mount it.
    ///
    /// # Arguments
    /// * `module` - The transpiled snippet
    /// * `capabilities` - Bindings injected into the snippet scope
    fn execute(
        &self,
        module: &Module,
        capabilities: &Capabilities,
    ) -> Result<RenderedOutput, ExecutionError>;
}
