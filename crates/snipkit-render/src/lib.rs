//! Dynamic preview rendering for component snippets.
//!
//! A snippet goes through [`transpile`] (oxc parse, JSX lowered to
//! `React.createElement` calls) and is then handed to a [`SnippetExecutor`],
//! which evaluates it with only the `React` capability in scope, validates
//! the default export and mounts it into a [`Node`] tree. [`PreviewRenderer`]
//! drives that pipeline as a state machine and turns every failure into an
//! inline error state.

mod builtins;
pub mod element;
pub mod executor;
pub mod interpreter;
pub mod ir;
pub mod mount;
mod objects;
mod react;
pub mod renderer;
pub mod traits;
pub mod transpile;
pub mod value;

pub use element::{render_html, text_content, Node};
pub use executor::{DirectEvaluator, SandboxLimits, SandboxedInterpreter};
pub use interpreter::{Interpreter, Interrupt, Limits};
pub use renderer::{FailureKind, MountedPreview, PreviewRenderer, RenderFailure, RenderState};
pub use traits::{Capabilities, ExecutionError, RenderedOutput, SnippetExecutor};
pub use transpile::{transpile, TranspileError, TranspileOptions};
