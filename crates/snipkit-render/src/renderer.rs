//! The preview state machine.
//!
//! ```text
//! Idle -> Transpiling -> Evaluating -> Validating -> Mounted
//!              |              |             |
//!              +--------------+-------------+--> Failed
//! ```
//!
//! Every failure, including a panic inside an executor, ends in
//! [`RenderState::Failed`]; nothing escapes to the caller. The pipeline
//! runs on its own thread with a large stack so deeply nested snippets
//! fail with an error instead of overflowing the caller's stack.

use std::any::Any;
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tracing::{debug, warn};

use crate::element::{escape_text, Node};
use crate::traits::{Capabilities, ExecutionError, SnippetExecutor};
use crate::transpile::{transpile, TranspileOptions};

/// Placeholder shown before a terminal state is reached.
pub const LOADING_TEXT: &str = "Rendering preview...";

/// Stack reserved for the render thread.
const RENDER_STACK_BYTES: usize = 256 * 1024 * 1024;

/// Where in the pipeline a render failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Transpile,
    Evaluation,
    InvalidExport,
}

impl FailureKind {
    /// Stage the state machine was in when it failed.
    pub fn stage(self) -> &'static str {
        match self {
            Self::Transpile => "transpiling",
            Self::Evaluation => "evaluating",
            Self::InvalidExport => "validating",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Output of a successful mount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountedPreview {
    pub nodes: Vec<Node>,
    pub html: String,
    pub console: Vec<String>,
    pub deferred_effects: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Idle,
    Transpiling,
    Evaluating,
    Validating,
    Mounted(MountedPreview),
    Failed(RenderFailure),
}

impl RenderState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Transpiling => "transpiling",
            Self::Evaluating => "evaluating",
            Self::Validating => "validating",
            Self::Mounted(_) => "mounted",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Mounted(_) | Self::Failed(_))
    }

    pub fn failure(&self) -> Option<&RenderFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn mounted(&self) -> Option<&MountedPreview> {
        match self {
            Self::Mounted(preview) => Some(preview),
            _ => None,
        }
    }

    /// HTML for the preview pane: the mounted tree, the inline error banner,
    /// or the loading placeholder.
    pub fn to_html(&self) -> String {
        match self {
            Self::Mounted(preview) => preview.html.clone(),
            Self::Failed(failure) => format!(
                r#"<div class="snipkit-error" role="alert">Error: {}</div>"#,
                escape_text(&failure.message)
            ),
            _ => format!(r#"<div class="snipkit-loading">{LOADING_TEXT}</div>"#),
        }
    }
}

/// Renders snippets through a [`SnippetExecutor`] and remembers the last one.
pub struct PreviewRenderer {
    executor: Arc<dyn SnippetExecutor>,
    capabilities: Capabilities,
    options: TranspileOptions,
    snippet: Option<String>,
    state: RenderState,
}

impl PreviewRenderer {
    pub fn new(executor: Arc<dyn SnippetExecutor>) -> Self {
        Self {
            executor,
            capabilities: Capabilities::default(),
            options: TranspileOptions::default(),
            snippet: None,
            state: RenderState::Idle,
        }
    }

    pub fn with_options(mut self, options: TranspileOptions) -> Self {
        self.capabilities.runtime_binding = options.jsx_runtime.clone();
        self.options = options;
        self
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Run the full pipeline for `source`. Does not touch the cached state.
    pub fn render(&self, source: &str) -> RenderState {
        let outcome = thread::scope(|scope| {
            thread::Builder::new()
                .name("snipkit-render".to_string())
                .stack_size(RENDER_STACK_BYTES)
                .spawn_scoped(scope, || self.pipeline(source))
                .map(|handle| handle.join())
        });
        match outcome {
            Ok(Ok(state)) => state,
            Ok(Err(payload)) => fail(
                RenderState::Evaluating,
                FailureKind::Evaluation,
                panic_message(payload),
            ),
            Err(err) => fail(
                RenderState::Idle,
                FailureKind::Evaluation,
                format!("could not start the render thread: {err}"),
            ),
        }
    }

    fn pipeline(&self, source: &str) -> RenderState {
        let mut state = RenderState::Idle;
        advance(&mut state, RenderState::Transpiling);

        let module = match transpile(source, &self.options) {
            Ok(module) => module,
            Err(err) => return fail(state, FailureKind::Transpile, err.to_string()),
        };

        advance(&mut state, RenderState::Evaluating);
        match self.executor.execute(&module, &self.capabilities) {
            Ok(output) => {
                advance(&mut state, RenderState::Validating);
                advance(
                    &mut state,
                    RenderState::Mounted(MountedPreview {
                        nodes: output.nodes,
                        html: output.html,
                        console: output.console,
                        deferred_effects: output.deferred_effects,
                    }),
                );
                state
            }
            Err(ExecutionError::InvalidExport) => {
                advance(&mut state, RenderState::Validating);
                fail(
                    state,
                    FailureKind::InvalidExport,
                    ExecutionError::InvalidExport.to_string(),
                )
            }
            Err(err) => fail(state, FailureKind::Evaluation, err.to_string()),
        }
    }

    /// Render `source` unless it equals the last snippet, in which case the
    /// cached terminal state is returned.
    pub fn update(&mut self, source: &str) -> &RenderState {
        if self.snippet.as_deref() != Some(source) {
            self.reset();
            self.state = self.render(source);
            self.snippet = Some(source.to_string());
        }
        &self.state
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn snippet(&self) -> Option<&str> {
        self.snippet.as_deref()
    }

    /// Discard the mounted output or error and return to Idle.
    pub fn reset(&mut self) {
        self.snippet = None;
        self.state = RenderState::Idle;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "executor panicked".to_string())
}

fn advance(state: &mut RenderState, next: RenderState) {
    debug!(from = state.label(), to = next.label(), "preview state transition");
    *state = next;
}

fn fail(mut state: RenderState, kind: FailureKind, message: String) -> RenderState {
    let message = if message.trim().is_empty() {
        format!("{} failed", kind.stage())
    } else {
        message
    };
    warn!(stage = kind.stage(), %message, "preview failed");
    advance(&mut state, RenderState::Failed(RenderFailure { kind, message }));
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{DirectEvaluator, SandboxLimits, SandboxedInterpreter};
    use crate::ir::Module;
    use crate::traits::RenderedOutput;

    fn renderer() -> PreviewRenderer {
        PreviewRenderer::new(Arc::new(SandboxedInterpreter::default()))
    }

    #[test]
    fn mounts_simple_component() {
        let state = renderer().render("exports.default = () => <div>Hi</div>;");
        let preview = state.mounted().expect("mounted");
        assert_eq!(preview.html, "<div>Hi</div>");
        assert_eq!(crate::element::text_content(&preview.nodes), "Hi");
    }

    #[test]
    fn unbalanced_tag_fails_in_transpile_stage() {
        let state = renderer().render("exports.default = () => <div>Hi</span>;");
        let failure = state.failure().expect("failed");
        assert_eq!(failure.kind, FailureKind::Transpile);
        assert!(!failure.message.is_empty());
        assert!(state.to_html().starts_with(r#"<div class="snipkit-error""#));
        assert!(!state.to_html().contains("Hi"));
    }

    #[test]
    fn thrown_error_message_is_captured() {
        let state = renderer().render(
            r#"exports.default = () => { throw new Error("boom"); };"#,
        );
        assert_eq!(
            state,
            RenderState::Failed(RenderFailure {
                kind: FailureKind::Evaluation,
                message: "boom".to_string(),
            })
        );
        assert_eq!(
            state.to_html(),
            r#"<div class="snipkit-error" role="alert">Error: boom</div>"#
        );
    }

    #[test]
    fn module_level_throw_fails() {
        let state = renderer().render("throw new TypeError('bad input');");
        let failure = state.failure().expect("failed");
        assert_eq!(failure.kind, FailureKind::Evaluation);
        assert_eq!(failure.message, "bad input");
    }

    #[test]
    fn non_callable_export_fails_validation() {
        let state = renderer().render("exports.default = { render: true };");
        let failure = state.failure().expect("failed");
        assert_eq!(failure.kind, FailureKind::InvalidExport);
        assert_eq!(failure.message, "exported value is not a valid component");
        assert_eq!(failure.kind.stage(), "validating");
    }

    #[test]
    fn rendering_is_idempotent() {
        let renderer = renderer();
        for source in [
            "exports.default = () => <p>{[1, 2, 3].map(n => n * 2).join(',')}</p>;",
            "exports.default = () => missing();",
        ] {
            assert_eq!(renderer.render(source), renderer.render(source));
        }
    }

    #[test]
    fn infinite_loop_fails_with_resource_message() {
        let renderer = PreviewRenderer::new(Arc::new(SandboxedInterpreter::new(SandboxLimits {
            max_steps: 10_000,
            ..SandboxLimits::default()
        })));
        let state = renderer.render("exports.default = () => { for (;;) {} };");
        let failure = state.failure().expect("failed");
        assert_eq!(failure.kind, FailureKind::Evaluation);
        assert!(failure.message.contains("step budget"));
    }

    #[test]
    fn update_caches_until_snippet_changes() {
        let mut renderer = renderer();
        assert_eq!(renderer.state(), &RenderState::Idle);

        let first = renderer.update("exports.default = () => <b>1</b>;").clone();
        assert_eq!(first.to_html(), "<b>1</b>");
        assert_eq!(renderer.update("exports.default = () => <b>1</b>;"), &first);

        let second = renderer.update("exports.default = () => <b>2</b>;");
        assert_eq!(second.to_html(), "<b>2</b>");

        renderer.reset();
        assert_eq!(renderer.state(), &RenderState::Idle);
        assert!(renderer.state().to_html().contains(LOADING_TEXT));
    }

    #[test]
    fn state_machine_is_executor_agnostic() {
        let source = "exports.default = () => <em>same</em>;";
        let sandboxed = renderer().render(source);
        let direct = PreviewRenderer::new(Arc::new(DirectEvaluator::new())).render(source);
        assert_eq!(sandboxed.to_html(), direct.to_html());
    }

    #[test]
    fn deeply_nested_parentheses_fail_to_transpile() {
        let source = format!(
            "exports.default = () => {}1{};",
            "(".repeat(5_000),
            ")".repeat(5_000)
        );
        let failure = renderer().render(&source).failure().cloned().expect("failed");
        assert_eq!(failure.kind, FailureKind::Transpile);
        assert!(failure.message.starts_with("Snippet nests too deeply"));
    }

    #[test]
    fn long_operator_chains_fail_to_transpile() {
        let chain = vec!["1"; 3_000].join(" + ");
        let source = format!("exports.default = () => <p>{{{chain}}}</p>;");
        let failure = renderer().render(&source).failure().cloned().expect("failed");
        assert_eq!(failure.kind, FailureKind::Transpile);
        assert!(failure.message.contains("limit 200 levels"));
    }

    #[test]
    fn async_effects_classes_and_collections_mount() {
        let state = renderer().render(
            r#"
            class Store extends React.Component {
                render() {
                    const seen = new Set(["a", "a", "b"]);
                    const counts = new Map([["x", 1]]);
                    outer: for (const key of seen) {
                        for (const n of [1, 2]) {
                            if (n === 2) continue outer;
                            counts.set(key, n);
                        }
                    }
                    return <p>{new Date().getFullYear()} {counts.size}</p>;
                }
            }
            exports.default = () => {
                React.useEffect(() => {
                    const load = async () => {};
                    load();
                }, []);
                return <Store />;
            };
            "#,
        );
        let preview = state.mounted().expect("mounted");
        assert_eq!(preview.html, "<p>2024 3</p>");
        assert_eq!(preview.deferred_effects, 1);
    }

    #[test]
    fn promise_reactions_run_after_mount() {
        let state = renderer().render(
            r#"
            async function load() {
                const value = await Promise.resolve(2);
                console.log("loaded", value);
            }
            exports.default = () => {
                Promise.resolve(1).then((v) => console.log("then", v));
                return <p>ok</p>;
            };
            load();
            "#,
        );
        let preview = state.mounted().expect("mounted");
        assert_eq!(preview.html, "<p>ok</p>");
        assert_eq!(
            preview.console,
            vec!["[log] loaded 2".to_string(), "[log] then 1".to_string()]
        );
    }

    struct PanickingExecutor;

    impl SnippetExecutor for PanickingExecutor {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn execute(
            &self,
            _module: &Module,
            _capabilities: &Capabilities,
        ) -> Result<RenderedOutput, ExecutionError> {
            panic!("executor bug");
        }
    }

    #[test]
    fn executor_panics_are_contained() {
        let renderer = PreviewRenderer::new(Arc::new(PanickingExecutor));
        let state = renderer.render("exports.default = () => null;");
        assert_eq!(state.failure().map(|f| f.message.as_str()), Some("executor bug"));
    }
}
