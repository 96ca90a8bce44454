//! Short-lived cache in front of datasource lookup by id
//!
//! Uses moka for thread-safe concurrent caching with TTL-based expiration.

use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{DatasourceResolver, StoreError};
use crate::models::{DatasourceRef, SignedInUser};

/// Wraps a resolver and caches `get_datasource` results per (org, id)
pub struct CachedDatasourceResolver<R> {
    inner: R,
    cache: Cache<(i64, i64), DatasourceRef>,
    hits: AtomicU64,
    misses: AtomicU64,
    ttl: Duration,
}

impl<R: DatasourceResolver> CachedDatasourceResolver<R> {
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, 1000, Duration::from_secs(5))
    }

    pub fn with_config(inner: R, max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[async_trait]
impl<R: DatasourceResolver> DatasourceResolver for CachedDatasourceResolver<R> {
    async fn get_datasource_by_name(
        &self,
        name: &str,
        org_id: i64,
    ) -> Result<DatasourceRef, StoreError> {
        self.inner.get_datasource_by_name(name, org_id).await
    }

    async fn get_datasource(
        &self,
        id: i64,
        user: &SignedInUser,
        skip_cache: bool,
    ) -> Result<DatasourceRef, StoreError> {
        let key = (user.org_id, id);
        if !skip_cache {
            if let Some(ds) = self.cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(ds);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let ds = self.inner.get_datasource(id, user, skip_cache).await?;
        self.cache.insert(key, ds.clone());
        Ok(ds)
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    pub entry_count: u64,
    pub ttl_secs: u64,
}
