//! In-process [`CatalogStore`].

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Component, Project, User};
use crate::store::{CatalogStore, StoreError};

/// A table that remembers when each key was first inserted.
#[derive(Debug)]
struct Table<K, V> {
    rows: HashMap<K, (u64, V)>,
    next_seq: u64,
}

impl<K: Eq + Hash, V: Clone> Table<K, V> {
    fn put(&mut self, key: K, value: V) {
        if let Some((_, row)) = self.rows.get_mut(&key) {
            *row = value;
            return;
        }
        self.rows.insert(key, (self.next_seq, value));
        self.next_seq += 1;
    }

    fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|(_, value)| value.clone())
    }

    fn remove(&mut self, key: &K) -> bool {
        self.rows.remove(key).is_some()
    }

    fn scan(&self, mut keep: impl FnMut(&V) -> bool) -> Vec<V> {
        let mut hits: Vec<&(u64, V)> = self.rows.values().filter(|(_, v)| keep(v)).collect();
        hits.sort_by_key(|(seq, _)| *seq);
        hits.into_iter().map(|(_, v)| v.clone()).collect()
    }
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            next_seq: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    projects: Table<Uuid, Project>,
    components: Table<Uuid, Component>,
    users: Table<String, User>,
}

/// Catalog store held in memory behind a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn put_project(&self, project: &Project) -> Result<(), StoreError> {
        self.tables.write().await.projects.put(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.get(&id))
    }

    async fn delete_project(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.projects.remove(&id))
    }

    async fn projects_by_owner(&self, user_id: &str) -> Result<Vec<Project>, StoreError> {
        Ok(self.tables.read().await.projects.scan(|p| p.user_id == user_id))
    }

    async fn public_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.tables.read().await.projects.scan(|p| p.is_public))
    }

    async fn put_component(&self, component: &Component) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .components
            .put(component.id, component.clone());
        Ok(())
    }

    async fn get_component(&self, id: Uuid) -> Result<Option<Component>, StoreError> {
        Ok(self.tables.read().await.components.get(&id))
    }

    async fn delete_component(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.components.remove(&id))
    }

    async fn components_by_project(&self, project_id: Uuid) -> Result<Vec<Component>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .components
            .scan(|c| c.project_id == project_id))
    }

    async fn public_components(&self) -> Result<Vec<Component>, StoreError> {
        Ok(self.tables.read().await.components.scan(|c| c.is_public))
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .users
            .put(user.external_id.clone(), user.clone());
        Ok(())
    }

    async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&external_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn project(owner: &str, name: &str, is_public: bool) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            user_id: owner.to_string(),
            name: name.to_string(),
            description: None,
            banner_url: None,
            is_public,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn scans_preserve_insertion_order() {
        let store = MemoryStore::new();
        let names = ["a", "b", "c", "d", "e"];
        for name in names {
            store.put_project(&project("u1", name, true)).await.unwrap();
        }
        let listed: Vec<String> = store
            .projects_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(listed, names);
    }

    #[tokio::test]
    async fn replacing_keeps_position() {
        let store = MemoryStore::new();
        let mut first = project("u1", "first", true);
        store.put_project(&first).await.unwrap();
        store.put_project(&project("u1", "second", true)).await.unwrap();

        first.name = "renamed".to_string();
        store.put_project(&first).await.unwrap();

        let listed = store.public_projects().await.unwrap();
        assert_eq!(listed[0].name, "renamed");
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let p = project("u1", "p", false);
        store.put_project(&p).await.unwrap();

        assert!(store.public_projects().await.unwrap().is_empty());
        assert!(store.delete_project(p.id).await.unwrap());
        assert!(!store.delete_project(p.id).await.unwrap());
        assert_eq!(store.get_project(p.id).await.unwrap(), None);
    }
}
