//! HTTP surface of the snipkit marketplace.
//!
//! Serves the fix-code and conversion endpoints, snippet previews and the
//! catalog REST API over axum.

pub mod error;
pub mod pages;
pub mod routes;
pub mod server;
pub mod watcher;

pub use error::ApiError;
pub use pages::PageRenderer;
pub use server::{build_router, AppState, Server, ServerConfig, ServerError};
pub use watcher::{SnippetWatcher, WatchEvent};
