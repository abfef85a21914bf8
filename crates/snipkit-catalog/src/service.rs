//! Catalog operations.

use std::sync::Arc;

use chrono::Utc;
use snipkit_sanitize::{ConvertError, FrameworkConverter, SanitizationService, SanitizeError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{
    normalize_tags, Component, ComponentDraft, ComponentFilter, ComponentPatch, Framework,
    NewUser, ProfilePatch, Project, ProjectDraft, ProjectPatch, ProjectSummary, User,
};
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("component not found: {0}")]
    ComponentNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("Premium subscription required")]
    PremiumRequired,

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// Projects, components and users over a [`CatalogStore`].
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    sanitizer: SanitizationService,
    converter: FrameworkConverter,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        sanitizer: SanitizationService,
        converter: FrameworkConverter,
    ) -> Self {
        Self {
            store,
            sanitizer,
            converter,
        }
    }

    pub async fn create_project(&self, user_id: &str, draft: ProjectDraft) -> Result<Project> {
        let user_id = required("user id", user_id)?;
        let name = required("project name", &draft.name)?;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            name,
            description: draft.description,
            banner_url: draft.banner_url,
            is_public: draft.is_public,
            created_at: now,
            updated_at: now,
        };
        self.store.put_project(&project).await?;
        info!(project = %project.id, "created project");
        Ok(project)
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project> {
        self.store
            .get_project(id)
            .await?
            .ok_or(CatalogError::ProjectNotFound(id))
    }

    pub async fn user_projects(&self, user_id: &str) -> Result<Vec<ProjectSummary>> {
        let projects = self.store.projects_by_owner(user_id).await?;
        self.summarize(projects).await
    }

    pub async fn public_projects(&self) -> Result<Vec<ProjectSummary>> {
        let projects = self.store.public_projects().await?;
        self.summarize(projects).await
    }

    async fn summarize(&self, projects: Vec<Project>) -> Result<Vec<ProjectSummary>> {
        let mut summaries = Vec::with_capacity(projects.len());
        for project in projects {
            let component_count = self.store.components_by_project(project.id).await?.len();
            summaries.push(ProjectSummary {
                project,
                component_count,
            });
        }
        Ok(summaries)
    }

    pub async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> Result<Project> {
        let mut project = self.get_project(id).await?;
        if let Some(name) = patch.name {
            project.name = required("project name", &name)?;
        }
        if let Some(description) = patch.description {
            project.description = Some(description);
        }
        if let Some(banner_url) = patch.banner_url {
            project.banner_url = Some(banner_url);
        }
        if let Some(is_public) = patch.is_public {
            project.is_public = is_public;
        }
        project.updated_at = Utc::now();
        self.store.put_project(&project).await?;
        Ok(project)
    }

    /// Delete the project, then every component filed under it.
    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        let project = self.get_project(id).await?;
        self.store.delete_project(project.id).await?;
        let components = self.store.components_by_project(project.id).await?;
        for component in &components {
            self.store.delete_component(component.id).await?;
        }
        info!(project = %id, components = components.len(), "deleted project");
        Ok(())
    }

    /// Sanitize the draft's code and persist the component.
    ///
    /// Nothing is stored when sanitization fails or yields no code.
    pub async fn create_component(&self, user_id: &str, draft: ComponentDraft) -> Result<Component> {
        let user_id = required("user id", user_id)?;
        let name = required("component name", &draft.name)?;
        if draft.code.trim().is_empty() {
            return Err(CatalogError::Validation("component code is required".to_string()));
        }
        let price = sale_price(draft.is_for_sale, draft.price)?;
        let project = self.get_project(draft.project_id).await?;

        let sanitized = self
            .sanitizer
            .sanitize(&draft.code)
            .await
            .inspect_err(|e| warn!(error = %e, project = %project.id, "component creation aborted"))?;

        let now = Utc::now();
        let component = Component {
            id: Uuid::new_v4(),
            project_id: project.id,
            user_id,
            name,
            description: draft.description,
            framework: draft.framework,
            code: draft.code,
            edited_code: sanitized.code,
            screenshot_url: draft.screenshot_url,
            is_public: draft.is_public,
            is_for_sale: draft.is_for_sale,
            price,
            tags: normalize_tags(draft.tags),
            created_at: now,
            updated_at: now,
        };
        self.store.put_component(&component).await?;
        // The project may have been deleted while the rewrite was in flight.
        if self.store.get_project(project.id).await?.is_none() {
            self.store.delete_component(component.id).await?;
            warn!(project = %project.id, "project deleted during component creation");
            return Err(CatalogError::ProjectNotFound(project.id));
        }
        info!(
            component = %component.id,
            language = %sanitized.language,
            "created component"
        );
        Ok(component)
    }

    pub async fn get_component(&self, id: Uuid) -> Result<Component> {
        self.store
            .get_component(id)
            .await?
            .ok_or(CatalogError::ComponentNotFound(id))
    }

    pub async fn project_components(&self, project_id: Uuid) -> Result<Vec<Component>> {
        Ok(self.store.components_by_project(project_id).await?)
    }

    /// Public components matching `filter`; the limit applies after filtering.
    pub async fn public_components(&self, filter: ComponentFilter) -> Result<Vec<Component>> {
        let matching = self
            .store
            .public_components()
            .await?
            .into_iter()
            .filter(|component| filter.matches(component));
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    /// Apply a metadata patch. `code` and `edited_code` never change.
    pub async fn update_component(&self, id: Uuid, patch: ComponentPatch) -> Result<Component> {
        let mut component = self.get_component(id).await?;
        if let Some(name) = patch.name {
            component.name = required("component name", &name)?;
        }
        if let Some(description) = patch.description {
            component.description = Some(description);
        }
        if let Some(framework) = patch.framework {
            component.framework = framework;
        }
        if let Some(screenshot_url) = patch.screenshot_url {
            component.screenshot_url = Some(screenshot_url);
        }
        if let Some(is_public) = patch.is_public {
            component.is_public = is_public;
        }
        if let Some(tags) = patch.tags {
            component.tags = normalize_tags(tags);
        }

        let is_for_sale = patch.is_for_sale.unwrap_or(component.is_for_sale);
        let price = patch.price.or(component.price);
        component.price = sale_price(is_for_sale, price)?;
        component.is_for_sale = is_for_sale;

        component.updated_at = Utc::now();
        self.store.put_component(&component).await?;
        Ok(component)
    }

    pub async fn delete_component(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_component(id).await? {
            return Err(CatalogError::ComponentNotFound(id));
        }
        Ok(())
    }

    /// Convert arbitrary code between frameworks on behalf of `external_id`.
    ///
    /// Same-framework requests are free; anything else needs a premium
    /// account. Unknown users are treated as non-premium.
    pub async fn convert_code(
        &self,
        external_id: &str,
        code: &str,
        from: Framework,
        to: Framework,
    ) -> Result<String> {
        if from != to {
            let premium = self
                .store
                .user_by_external_id(external_id)
                .await?
                .is_some_and(|user| user.is_premium);
            if !premium {
                return Err(CatalogError::PremiumRequired);
            }
        }
        Ok(self
            .converter
            .convert(code, from.as_str(), to.as_str())
            .await?)
    }

    /// Convert a stored component's original source.
    pub async fn convert_component(
        &self,
        external_id: &str,
        id: Uuid,
        to: Framework,
    ) -> Result<String> {
        let component = self.get_component(id).await?;
        self.convert_code(external_id, &component.code, component.framework, to)
            .await
    }

    /// Create a user, or return the existing one with the same external id.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let external_id = required("external id", &new_user.external_id)?;
        if let Some(existing) = self.store.user_by_external_id(&external_id).await? {
            return Ok(existing);
        }
        let user = User {
            id: Uuid::new_v4(),
            external_id,
            email: new_user.email,
            name: new_user.name,
            avatar: new_user.avatar,
            bio: None,
            website: None,
            github: None,
            twitter: None,
            is_premium: false,
            followers: Vec::new(),
            following: Vec::new(),
        };
        self.store.put_user(&user).await?;
        info!(user = %user.external_id, "created user");
        Ok(user)
    }

    pub async fn user_by_external_id(&self, external_id: &str) -> Result<User> {
        self.store
            .user_by_external_id(external_id)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(external_id.to_string()))
    }

    pub async fn update_profile(&self, external_id: &str, patch: ProfilePatch) -> Result<User> {
        let mut user = self.user_by_external_id(external_id).await?;
        let ProfilePatch {
            name,
            avatar,
            bio,
            website,
            github,
            twitter,
        } = patch;
        for (field, value) in [
            (&mut user.name, name),
            (&mut user.avatar, avatar),
            (&mut user.bio, bio),
            (&mut user.website, website),
            (&mut user.github, github),
            (&mut user.twitter, twitter),
        ] {
            if value.is_some() {
                *field = value;
            }
        }
        self.store.put_user(&user).await?;
        Ok(user)
    }

    /// Record that `follower` follows `following`. Repeating it is a no-op.
    pub async fn follow_user(&self, follower: &str, following: &str) -> Result<()> {
        if follower == following {
            return Err(CatalogError::Validation("users cannot follow themselves".to_string()));
        }
        let mut source = self.user_by_external_id(follower).await?;
        let mut target = self.user_by_external_id(following).await?;

        if !source.following.iter().any(|id| id == following) {
            source.following.push(following.to_string());
            self.store.put_user(&source).await?;
        }
        if !target.followers.iter().any(|id| id == follower) {
            target.followers.push(follower.to_string());
            self.store.put_user(&target).await?;
        }
        Ok(())
    }

    pub async fn set_premium(&self, external_id: &str, is_premium: bool) -> Result<User> {
        let mut user = self.user_by_external_id(external_id).await?;
        user.is_premium = is_premium;
        self.store.put_user(&user).await?;
        info!(user = %external_id, is_premium, "updated premium status");
        Ok(user)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Price stored for a component: required, finite and non-negative when the
/// component is for sale, absent otherwise.
fn sale_price(is_for_sale: bool, price: Option<f64>) -> Result<Option<f64>> {
    if !is_for_sale {
        return Ok(None);
    }
    match price {
        Some(price) if price.is_finite() && price >= 0.0 => Ok(Some(price)),
        Some(_) => Err(CatalogError::Validation(
            "price must be a non-negative number".to_string(),
        )),
        None => Err(CatalogError::Validation(
            "price is required for components that are for sale".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use snipkit_sanitize::{ChatMessage, CompletionClient, CompletionError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers language detection with "JSX" and everything else with a
    /// fixed reply.
    struct StubClient {
        reply: Mutex<Result<Option<String>, CompletionError>>,
        calls: AtomicUsize,
    }

    impl StubClient {
        fn replying(reply: Result<Option<String>, CompletionError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
        ) -> std::result::Result<Option<String>, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if messages[0].content.starts_with("What language") {
                return Ok(Some("JSX".to_string()));
            }
            self.reply.lock().unwrap().clone()
        }
    }

    fn service(client: Arc<StubClient>) -> (CatalogService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = CatalogService::new(
            store.clone(),
            SanitizationService::new(client.clone()),
            FrameworkConverter::new(client),
        );
        (service, store)
    }

    fn sanitized() -> Arc<StubClient> {
        StubClient::replying(Ok(Some("exports.default = () => <div>ok</div>;".to_string())))
    }

    fn project_draft(name: &str, is_public: bool) -> ProjectDraft {
        ProjectDraft {
            name: name.to_string(),
            is_public,
            ..ProjectDraft::default()
        }
    }

    fn component_draft(project_id: Uuid, framework: Framework) -> ComponentDraft {
        ComponentDraft {
            project_id,
            name: "Card".to_string(),
            description: None,
            framework,
            code: "<div>ok</div>".to_string(),
            screenshot_url: None,
            is_public: true,
            is_for_sale: false,
            price: None,
            tags: vec!["ui".to_string(), " ui ".to_string(), "card".to_string()],
        }
    }

    #[tokio::test]
    async fn creates_component_with_sanitized_code() {
        let client = sanitized();
        let (catalog, _) = service(client.clone());
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();

        let component = catalog
            .create_component("alice", component_draft(project.id, Framework::Html))
            .await
            .unwrap();

        assert_eq!(component.code, "<div>ok</div>");
        assert_eq!(component.edited_code, "exports.default = () => <div>ok</div>;");
        assert_eq!(component.tags, vec!["ui", "card"]);
        assert_eq!(client.calls(), 2);
        assert_eq!(catalog.get_component(component.id).await.unwrap(), component);
    }

    #[tokio::test]
    async fn failed_sanitization_persists_nothing() {
        for reply in [
            Ok(None),
            Err(CompletionError::Transport("down".to_string())),
        ] {
            let (catalog, store) = service(StubClient::replying(reply));
            let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();

            let err = catalog
                .create_component("alice", component_draft(project.id, Framework::React))
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Sanitize(_)));
            assert!(store.components_by_project(project.id).await.unwrap().is_empty());
        }
    }

    /// Deletes a project from the store while the rewrite is requested.
    struct DeletingClient {
        store: Arc<MemoryStore>,
        project: Mutex<Option<Uuid>>,
    }

    #[async_trait]
    impl CompletionClient for DeletingClient {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
        ) -> std::result::Result<Option<String>, CompletionError> {
            if messages[0].content.starts_with("What language") {
                return Ok(Some("JSX".to_string()));
            }
            let project = self.project.lock().unwrap().take();
            if let Some(id) = project {
                self.store.delete_project(id).await.unwrap();
            }
            Ok(Some("exports.default = () => null;".to_string()))
        }
    }

    #[tokio::test]
    async fn project_deleted_mid_creation_leaves_no_component() {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(DeletingClient {
            store: store.clone(),
            project: Mutex::new(None),
        });
        let catalog = CatalogService::new(
            store.clone(),
            SanitizationService::new(client.clone()),
            FrameworkConverter::new(client.clone()),
        );
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();
        *client.project.lock().unwrap() = Some(project.id);

        let err = catalog
            .create_component("alice", component_draft(project.id, Framework::React))
            .await
            .unwrap_err();

        assert_eq!(err, CatalogError::ProjectNotFound(project.id));
        assert!(store.components_by_project(project.id).await.unwrap().is_empty());
        assert!(catalog.public_components(ComponentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected_before_sanitizing() {
        let client = sanitized();
        let (catalog, _) = service(client.clone());
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();

        let mut unnamed = component_draft(project.id, Framework::React);
        unnamed.name = "  ".to_string();
        let mut unpriced = component_draft(project.id, Framework::React);
        unpriced.is_for_sale = true;
        let mut negative = component_draft(project.id, Framework::React);
        negative.is_for_sale = true;
        negative.price = Some(-1.0);
        let mut infinite = component_draft(project.id, Framework::React);
        infinite.is_for_sale = true;
        infinite.price = Some(f64::INFINITY);

        for draft in [unnamed, unpriced, negative, infinite] {
            let err = catalog.create_component("alice", draft).await.unwrap_err();
            assert!(matches!(err, CatalogError::Validation(_)), "{err:?}");
        }

        let orphan = component_draft(Uuid::new_v4(), Framework::React);
        assert!(matches!(
            catalog.create_component("alice", orphan).await,
            Err(CatalogError::ProjectNotFound(_))
        ));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn project_listings_count_components() {
        let (catalog, _) = service(sanitized());
        let public = catalog.create_project("alice", project_draft("Public", true)).await.unwrap();
        catalog.create_project("alice", project_draft("Private", false)).await.unwrap();
        catalog.create_project("bob", project_draft("Other", true)).await.unwrap();
        for _ in 0..2 {
            catalog
                .create_component("alice", component_draft(public.id, Framework::React))
                .await
                .unwrap();
        }

        let mine = catalog.user_projects("alice").await.unwrap();
        let counts: Vec<(&str, usize)> = mine
            .iter()
            .map(|s| (s.project.name.as_str(), s.component_count))
            .collect();
        assert_eq!(counts, vec![("Public", 2), ("Private", 0)]);

        let gallery = catalog.public_projects().await.unwrap();
        assert_eq!(gallery.len(), 2);
        assert!(gallery.iter().all(|s| s.project.is_public));
    }

    #[tokio::test]
    async fn deleting_project_cascades() {
        let (catalog, store) = service(sanitized());
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();
        let component = catalog
            .create_component("alice", component_draft(project.id, Framework::React))
            .await
            .unwrap();

        catalog.delete_project(project.id).await.unwrap();

        assert_eq!(store.get_component(component.id).await.unwrap(), None);
        assert!(matches!(
            catalog.get_project(project.id).await,
            Err(CatalogError::ProjectNotFound(_))
        ));
        assert!(catalog.public_components(ComponentFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gallery_filter_applies_limit_last() {
        let (catalog, _) = service(sanitized());
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();
        for framework in [Framework::React, Framework::Vue, Framework::React, Framework::React] {
            catalog
                .create_component("alice", component_draft(project.id, framework))
                .await
                .unwrap();
        }
        let mut for_sale = component_draft(project.id, Framework::React);
        for_sale.is_for_sale = true;
        for_sale.price = Some(9.5);
        let for_sale = catalog.create_component("alice", for_sale).await.unwrap();
        let mut hidden = component_draft(project.id, Framework::React);
        hidden.is_public = false;
        catalog.create_component("alice", hidden).await.unwrap();

        let react = ComponentFilter {
            framework: Some(Framework::React),
            ..ComponentFilter::default()
        };
        assert_eq!(catalog.public_components(react).await.unwrap().len(), 4);

        let limited = ComponentFilter {
            limit: Some(2),
            ..react
        };
        assert_eq!(catalog.public_components(limited).await.unwrap().len(), 2);

        let selling = ComponentFilter {
            for_sale: Some(true),
            ..ComponentFilter::default()
        };
        let selling = catalog.public_components(selling).await.unwrap();
        assert_eq!(selling.len(), 1);
        assert_eq!(selling[0].id, for_sale.id);
        assert_eq!(selling[0].price, Some(9.5));
    }

    #[tokio::test]
    async fn update_is_metadata_only() {
        let client = sanitized();
        let (catalog, _) = service(client.clone());
        let project = catalog.create_project("alice", project_draft("Kit", true)).await.unwrap();
        let original = catalog
            .create_component("alice", component_draft(project.id, Framework::React))
            .await
            .unwrap();

        let updated = catalog
            .update_component(
                original.id,
                ComponentPatch {
                    name: Some("Hero".to_string()),
                    is_for_sale: Some(true),
                    price: Some(3.0),
                    tags: Some(vec!["hero".to_string()]),
                    ..ComponentPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Hero");
        assert_eq!(updated.price, Some(3.0));
        assert_eq!(updated.code, original.code);
        assert_eq!(updated.edited_code, original.edited_code);
        assert!(updated.updated_at >= original.updated_at);
        assert_eq!(client.calls(), 2);

        let off_sale = catalog
            .update_component(
                original.id,
                ComponentPatch {
                    is_for_sale: Some(false),
                    ..ComponentPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(off_sale.price, None);

        let err = catalog
            .update_component(
                original.id,
                ComponentPatch {
                    is_for_sale: Some(true),
                    ..ComponentPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn update_project_bumps_timestamp() {
        let (catalog, _) = service(sanitized());
        let project = catalog.create_project("alice", project_draft("Kit", false)).await.unwrap();
        let updated = catalog
            .update_project(
                project.id,
                ProjectPatch {
                    description: Some("Buttons".to_string()),
                    is_public: Some(true),
                    ..ProjectPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Buttons"));
        assert!(updated.is_public);
        assert_eq!(updated.name, "Kit");
        assert!(updated.updated_at >= project.updated_at);
        assert_eq!(updated.created_at, project.created_at);
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let (catalog, _) = service(sanitized());
        let new_user = NewUser {
            external_id: "clerk_1".to_string(),
            email: "a@example.com".to_string(),
            ..NewUser::default()
        };
        let first = catalog.create_user(new_user.clone()).await.unwrap();
        let second = catalog
            .create_user(NewUser {
                email: "other@example.com".to_string(),
                ..new_user
            })
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(!first.is_premium);
    }

    #[tokio::test]
    async fn profile_updates_require_existing_user() {
        let (catalog, _) = service(sanitized());
        assert_eq!(
            catalog.update_profile("ghost", ProfilePatch::default()).await,
            Err(CatalogError::UserNotFound("ghost".to_string()))
        );

        catalog
            .create_user(NewUser {
                external_id: "u1".to_string(),
                email: "u1@example.com".to_string(),
                name: Some("Ada".to_string()),
                avatar: None,
            })
            .await
            .unwrap();
        let user = catalog
            .update_profile(
                "u1",
                ProfilePatch {
                    bio: Some("Builds buttons".to_string()),
                    ..ProfilePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(user.bio.as_deref(), Some("Builds buttons"));
        assert_eq!(user.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn following_is_idempotent() {
        let (catalog, _) = service(sanitized());
        for id in ["a", "b"] {
            catalog
                .create_user(NewUser {
                    external_id: id.to_string(),
                    email: format!("{id}@example.com"),
                    ..NewUser::default()
                })
                .await
                .unwrap();
        }
        catalog.follow_user("a", "b").await.unwrap();
        catalog.follow_user("a", "b").await.unwrap();

        assert_eq!(catalog.user_by_external_id("a").await.unwrap().following, vec!["b"]);
        assert_eq!(catalog.user_by_external_id("b").await.unwrap().followers, vec!["a"]);
        assert!(matches!(
            catalog.follow_user("a", "missing").await,
            Err(CatalogError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn conversion_is_gated_on_premium() {
        let client = StubClient::replying(Ok(Some("<template/>".to_string())));
        let (catalog, _) = service(client.clone());
        catalog
            .create_user(NewUser {
                external_id: "free".to_string(),
                email: "free@example.com".to_string(),
                ..NewUser::default()
            })
            .await
            .unwrap();

        assert_eq!(
            catalog
                .convert_code("free", "<div/>", Framework::React, Framework::Vue)
                .await,
            Err(CatalogError::PremiumRequired)
        );
        assert_eq!(
            catalog
                .convert_code("nobody", "<div/>", Framework::React, Framework::Vue)
                .await,
            Err(CatalogError::PremiumRequired)
        );
        assert_eq!(client.calls(), 0);

        assert_eq!(
            catalog
                .convert_code("free", "<div/>", Framework::React, Framework::React)
                .await
                .unwrap(),
            "<div/>"
        );
        assert_eq!(client.calls(), 0);

        catalog.set_premium("free", true).await.unwrap();
        assert_eq!(
            catalog
                .convert_code("free", "<div/>", Framework::React, Framework::Vue)
                .await
                .unwrap(),
            "<template/>"
        );
        assert_eq!(client.calls(), 1);
    }
}
