//! Executor implementations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::builtins::from_json;
use crate::element::render_html;
use crate::interpreter::{Interpreter, Interrupt, Limits};
use crate::ir::Module;
use crate::mount::mount_component;
use crate::react;
use crate::traits::{Capabilities, ExecutionError, RenderedOutput, SnippetExecutor};
use crate::value::Value;

/// Resource budgets of the [`SandboxedInterpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Statements, loop iterations and calls allowed per render
    pub max_steps: u64,

    /// Nested function calls, including component renders
    pub max_call_depth: usize,

    /// Elements created through `createElement`
    pub max_elements: usize,

    /// Wall-clock budget in milliseconds
    pub timeout_ms: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 64,
            max_elements: 5_000,
            timeout_ms: 2_000,
        }
    }
}

impl From<SandboxLimits> for Limits {
    fn from(limits: SandboxLimits) -> Self {
        Limits {
            max_steps: Some(limits.max_steps),
            max_call_depth: limits.max_call_depth,
            max_elements: Some(limits.max_elements),
            timeout: Some(Duration::from_millis(limits.timeout_ms)),
        }
    }
}

/// Production executor: restricted scope plus step, depth, element and
/// time budgets.
#[derive(Debug, Clone, Default)]
pub struct SandboxedInterpreter {
    limits: SandboxLimits,
}

impl SandboxedInterpreter {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }
}

impl SnippetExecutor for SandboxedInterpreter {
    fn name(&self) -> &'static str {
        "sandboxed"
    }

    fn execute(
        &self,
        module: &Module,
        capabilities: &Capabilities,
    ) -> Result<RenderedOutput, ExecutionError> {
        run(self.limits.into(), &[], module, capabilities)
    }
}

/// Executor for trusted fixtures: no step, element or time budget, and
/// extra globals supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct DirectEvaluator {
    globals: Vec<(String, serde_json::Value)>,
}

impl DirectEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `value` to snippets as the global `name`.
    pub fn with_global(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.globals.push((name.into(), value));
        self
    }
}

impl SnippetExecutor for DirectEvaluator {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn execute(
        &self,
        module: &Module,
        capabilities: &Capabilities,
    ) -> Result<RenderedOutput, ExecutionError> {
        run(Limits::unbounded(), &self.globals, module, capabilities)
    }
}

fn run(
    limits: Limits,
    globals: &[(String, serde_json::Value)],
    module: &Module,
    capabilities: &Capabilities,
) -> Result<RenderedOutput, ExecutionError> {
    let mut interp = Interpreter::new(limits);
    for (name, value) in globals {
        interp.define_global(name, from_json(value));
    }
    interp.define_global(&capabilities.runtime_binding, react::runtime());

    interp.run(module).map_err(execution_error)?;

    let component = interp.default_export();
    if !matches!(component, Value::Function(_)) {
        return Err(ExecutionError::InvalidExport);
    }

    let nodes = mount_component(&mut interp, &component).map_err(execution_error)?;
    interp.drain_jobs().map_err(execution_error)?;
    Ok(RenderedOutput {
        html: render_html(&nodes),
        nodes,
        console: interp.take_console(),
        deferred_effects: interp.render.deferred_effects,
        steps: interp.steps(),
    })
}

fn execution_error(interrupt: Interrupt) -> ExecutionError {
    match interrupt {
        Interrupt::Exhausted(message) => ExecutionError::ResourceExhausted(message),
        thrown => ExecutionError::Evaluation(thrown.message()),
    }
}
