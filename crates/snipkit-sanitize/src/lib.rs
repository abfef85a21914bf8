//! Snippet sanitization through an external completion API.
//!
//! [`SanitizationService`] asks the model for the snippet's language, then
//! asks it to rewrite the snippet into the `exports.default = () => { ... }`
//! form the preview renderer expects. [`FrameworkConverter`] uses the same
//! client to translate a component between frameworks.

pub mod client;
pub mod convert;
pub mod prompt;
pub mod service;

pub use client::{
    ChatMessage, CompletionClient, CompletionConfig, CompletionError, HttpCompletionClient,
};
pub use convert::{ConvertError, FrameworkConverter};
pub use prompt::LanguageLabel;
pub use service::{SanitizationService, SanitizeError, Sanitized};
