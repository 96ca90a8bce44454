//! Collaborator interfaces the pipeline reads from, plus in-memory and
//! cached implementations

pub mod cache;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{AlertDefinition, Dashboard, DatasourceRef, SignedInUser};

pub use cache::{CacheStats, CachedDatasourceResolver};
pub use memory::{FixtureError, Fixtures, MemoryStore};

/// Source of stored alert definitions
#[async_trait]
pub trait AlertDefinitionStore: Send + Sync {
    async fn get_definition(&self, id: i64) -> Result<AlertDefinition, StoreError>;
}

/// Source of stored dashboards
#[async_trait]
pub trait DashboardStore: Send + Sync {
    async fn get_dashboard(&self, id: i64) -> Result<Dashboard, StoreError>;
}

/// Datasource lookup by name within an org, and by id on behalf of a user
#[async_trait]
pub trait DatasourceResolver: Send + Sync {
    async fn get_datasource_by_name(
        &self,
        name: &str,
        org_id: i64,
    ) -> Result<DatasourceRef, StoreError>;

    /// `skip_cache` asks caching implementations to bypass and refresh
    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        skip_cache: bool,
    ) -> Result<DatasourceRef, StoreError>;
}

#[async_trait]
impl<T: DatasourceResolver + ?Sized> DatasourceResolver for Arc<T> {
    async fn get_datasource_by_name(
        &self,
        name: &str,
        org_id: i64,
    ) -> Result<DatasourceRef, StoreError> {
        (**self).get_datasource_by_name(name, org_id).await
    }

    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        skip_cache: bool,
    ) -> Result<DatasourceRef, StoreError> {
        (**self).get_datasource(id, user, skip_cache).await
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
