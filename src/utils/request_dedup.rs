use std::future::Future;
use std::time::{Duration, Instant};

use derive_more::{Display, From};
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Request signature, e.g. `GET /employees?limit=50&page=1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey(key.to_owned())
    }
}

#[derive(Debug, Clone)]
struct CachedResponse {
    value: Value,
    window: Duration,
}

/// Each entry lives for the window its caller asked for.
struct WindowExpiry;

impl Expiry<CacheKey, CachedResponse> for WindowExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CachedResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.window)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CachedResponse,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.window)
    }
}

/// Collapses concurrent identical reads into one request and keeps the
/// settled value for a short window.
#[derive(Clone)]
pub struct RequestDeduplicator {
    cache: Cache<CacheKey, CachedResponse>,
}

impl RequestDeduplicator {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .expire_after(WindowExpiry)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Returns the cached value for `key`, joins an in-flight request for
    /// it, or runs `request`. Failures are handed to every waiting caller
    /// and never cached, so the next call runs `request` again.
    pub async fn dedupe<F>(
        &self,
        key: CacheKey,
        request: F,
        window: Duration,
    ) -> Result<Value, ApiError>
    where
        F: Future<Output = Result<Value, ApiError>> + Send,
    {
        let signature = key.clone();
        let init = async move {
            debug!(key = %signature, "Cache miss, issuing request");
            request
                .await
                .map(|value| CachedResponse { value, window })
        };

        self.cache
            .try_get_with(key, init)
            .await
            .map(|cached| cached.value)
            .map_err(|e| (*e).clone())
    }

    /// Puts a freshly fetched value in place, e.g. after a bypassing read.
    pub async fn store(&self, key: CacheKey, value: Value, window: Duration) {
        self.cache.insert(key, CachedResponse { value, window }).await;
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.cache.get(key).await.is_some()
    }

    pub async fn clear(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Drops every entry whose signature starts with `prefix`.
    pub fn clear_prefix(&self, prefix: &str) {
        let prefix = prefix.to_owned();
        let matcher = prefix.clone();
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |key, _| key.as_str().starts_with(&matcher))
        {
            warn!(error = %e, prefix = %prefix, "Prefix invalidation unavailable, clearing all");
            self.cache.invalidate_all();
        }
    }

    pub fn clear_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new(1_000)
    }
}
