//! Server setup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use snipkit_catalog::{CatalogService, CatalogStore};
use snipkit_render::SnippetExecutor;
use snipkit_sanitize::{CompletionClient, FrameworkConverter, SanitizationService};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pages::PageRenderer;
use crate::routes::{ai, catalog, preview};

/// Address the server listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::Address(format!("{}:{}", self.host, self.port)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    Address(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(SocketAddr, String),

    #[error("Template error: {0}")]
    Template(String),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub sanitizer: SanitizationService,
    pub executor: Arc<dyn SnippetExecutor>,
    pub pages: Arc<PageRenderer>,
}

impl AppState {
    /// Wire the services around one completion client and one store.
    pub fn new(
        store: Arc<dyn CatalogStore>,
        client: Arc<dyn CompletionClient>,
        executor: Arc<dyn SnippetExecutor>,
    ) -> Result<Self, ServerError> {
        let sanitizer = SanitizationService::new(client.clone());
        let converter = FrameworkConverter::new(client);
        let pages = PageRenderer::new().map_err(|e| ServerError::Template(e.to_string()))?;
        Ok(Self {
            catalog: CatalogService::new(store, sanitizer.clone(), converter),
            sanitizer,
            executor,
            pages: Arc::new(pages),
        })
    }
}

/// All routes, with request tracing and permissive CORS.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai/fixcode", post(ai::fix_code))
        .route("/api/ai/convert", post(ai::convert))
        .route("/api/preview", post(preview::render_snippet))
        .route("/preview/{id}", get(preview::component_page))
        .route(
            "/api/projects",
            post(catalog::create_project).get(catalog::my_projects),
        )
        .route("/api/projects/public", get(catalog::public_projects))
        .route(
            "/api/projects/{id}",
            get(catalog::get_project)
                .patch(catalog::update_project)
                .delete(catalog::delete_project),
        )
        .route(
            "/api/projects/{id}/components",
            get(catalog::project_components),
        )
        .route("/api/components", post(catalog::create_component))
        .route("/api/components/public", get(catalog::public_components))
        .route(
            "/api/components/{id}",
            get(catalog::get_component)
                .patch(catalog::update_component)
                .delete(catalog::delete_component),
        )
        .route("/api/components/{id}/convert", post(ai::convert_component))
        .route("/api/users", post(catalog::create_user))
        .route(
            "/api/users/{external_id}",
            get(catalog::get_user).patch(catalog::update_profile),
        )
        .route(
            "/api/users/{external_id}/follow",
            post(catalog::follow_user),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(addr, e.to_string()))?;

        tracing::info!("Starting snipkit server at http://{}", addr);

        axum::serve(listener, build_router(self.state))
            .await
            .map_err(|e| ServerError::Bind(addr, e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_locally() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn rejects_bad_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            port: 80,
        };
        assert!(matches!(config.socket_addr(), Err(ServerError::Address(_))));
    }
}
