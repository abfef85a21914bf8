//! Storage port for catalog records.

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{Component, Project, User};

/// Errors raised by storage adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("catalog store connection failed: {message}")]
    Connection { message: String },

    #[error("catalog store query failed: {message}")]
    Query { message: String },
}

/// Keyed persistence for projects, components and users.
///
/// Writes are visible to every read that starts after the write returns.
/// Scans return records in insertion order.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or replace a project.
    async fn put_project(&self, project: &Project) -> Result<(), StoreError>;

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    /// Returns whether a project was removed.
    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn projects_by_owner(&self, user_id: &str) -> Result<Vec<Project>, StoreError>;

    async fn public_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Insert or replace a component.
    async fn put_component(&self, component: &Component) -> Result<(), StoreError>;

    async fn get_component(&self, id: Uuid) -> Result<Option<Component>, StoreError>;

    /// Returns whether a component was removed.
    async fn delete_component(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn components_by_project(&self, project_id: Uuid) -> Result<Vec<Component>, StoreError>;

    async fn public_components(&self) -> Result<Vec<Component>, StoreError>;

    /// Insert or replace a user, keyed by `external_id`.
    async fn put_user(&self, user: &User) -> Result<(), StoreError>;

    async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
}
