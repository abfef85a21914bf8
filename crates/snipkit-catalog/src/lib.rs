//! Marketplace catalog: projects, components and users.
//!
//! [`CatalogService`] owns the business rules (sanitize-before-persist,
//! cascade delete, sale price validation, the premium conversion gate) and
//! talks to storage only through [`CatalogStore`].

pub mod memory;
pub mod model;
pub mod service;
pub mod store;

pub use memory::MemoryStore;
pub use model::{
    Component, ComponentDraft, ComponentFilter, ComponentPatch, Framework, NewUser, ProfilePatch,
    Project, ProjectDraft, ProjectPatch, ProjectSummary, UnknownFramework, User,
};
pub use service::{CatalogError, CatalogService};
pub use store::{CatalogStore, StoreError};
