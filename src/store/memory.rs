use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{AlertDefinitionStore, DashboardStore, DatasourceResolver, StoreError};
use crate::models::{AlertDefinition, Dashboard, DatasourceRef, SignedInUser};

/// In-memory store backing all three collaborator interfaces
#[derive(Default)]
pub struct MemoryStore {
    definitions: DashMap<i64, AlertDefinition>,
    dashboards: DashMap<i64, Dashboard>,
    datasources: DashMap<i64, DatasourceRef>,
    /// (org_id, name) -> datasource id
    names: RwLock<HashMap<(i64, String), i64>>,
}

/// Seed data for a `MemoryStore`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub definitions: Vec<AlertDefinition>,
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
    #[serde(default)]
    pub datasources: Vec<DatasourceRef>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        let store = Self::new();
        for definition in fixtures.definitions {
            store.insert_definition(definition);
        }
        for dashboard in fixtures.dashboards {
            store.insert_dashboard(dashboard);
        }
        for datasource in fixtures.datasources {
            store.insert_datasource(datasource);
        }
        store
    }

    /// Load seed data from a JSON file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let fixtures: Fixtures = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            definitions = fixtures.definitions.len(),
            dashboards = fixtures.dashboards.len(),
            datasources = fixtures.datasources.len(),
            "Loaded fixtures"
        );
        Ok(Self::from_fixtures(fixtures))
    }

    pub fn insert_definition(&self, definition: AlertDefinition) {
        self.definitions.insert(definition.id, definition);
    }

    pub fn insert_dashboard(&self, dashboard: Dashboard) {
        self.dashboards.insert(dashboard.id, dashboard);
    }

    pub fn insert_datasource(&self, datasource: DatasourceRef) {
        let mut names = self.names.write();
        if let Some(previous) = self.datasources.insert(datasource.id, datasource.clone()) {
            names.remove(&(previous.org_id, previous.name));
        }
        names.insert((datasource.org_id, datasource.name), datasource.id);
    }

    pub fn remove_datasource(&self, id: i64) -> Option<DatasourceRef> {
        let mut names = self.names.write();
        let (_, removed) = self.datasources.remove(&id)?;
        names.remove(&(removed.org_id, removed.name.clone()));
        Some(removed)
    }
}

#[async_trait]
impl AlertDefinitionStore for MemoryStore {
    async fn get_definition(&self, id: i64) -> Result<AlertDefinition, StoreError> {
        self.definitions
            .get(&id)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::not_found("alert definition", id))
    }
}

#[async_trait]
impl DashboardStore for MemoryStore {
    async fn get_dashboard(&self, id: i64) -> Result<Dashboard, StoreError> {
        self.dashboards
            .get(&id)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::not_found("dashboard", id))
    }
}

#[async_trait]
impl DatasourceResolver for MemoryStore {
    async fn get_datasource_by_name(
        &self,
        name: &str,
        org_id: i64,
    ) -> Result<DatasourceRef, StoreError> {
        let id = self
            .names
            .read()
            .get(&(org_id, name.to_string()))
            .copied()
            .ok_or_else(|| StoreError::not_found("datasource", name))?;
        self.datasources
            .get(&id)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::not_found("datasource", name))
    }

    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        _skip_cache: bool,
    ) -> Result<DatasourceRef, StoreError> {
        // datasources are scoped to the user's org
        self.datasources
            .get(&id)
            .filter(|d| d.org_id == user.org_id)
            .map(|d| d.clone())
            .ok_or_else(|| StoreError::not_found("datasource", id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fixture file: {0}")]
    Parse(#[from] serde_json::Error),
}
