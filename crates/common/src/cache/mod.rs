//! Current-user cache
//!
//! Resolving a request's user means a token check plus a profile read. The
//! result may be reused for a few seconds per token. Nothing here is relied on
//! for authorization freshness beyond that window.
//!
//! Provides:
//! - Redis client with JSON get/set and TTL
//! - `ProfileCache` trait with memory, Redis and disabled implementations

use crate::auth::{hash_session_token, Identity};
use crate::config::{CacheBackend, CacheSettings};
use crate::db::models::Profile;
use crate::errors::{AppError, Result};
use crate::metrics::record_cache;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Redis cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL (redis://host:port)
    pub url: String,
    /// Default TTL in seconds
    pub default_ttl_secs: u64,
    /// Key prefix for namespacing
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            default_ttl_secs: 5,
            key_prefix: "minjok".to_string(),
        }
    }
}

/// Redis cache client
pub struct Cache {
    connection: RwLock<MultiplexedConnection>,
    config: CacheConfig,
}

impl Cache {
    /// Create a new cache client
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection: RwLock::new(connection),
            config,
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", full_key, e),
        })?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| AppError::CacheError {
                    message: format!("Failed to parse cached value: {}", e),
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with the configured TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let full_key = self.key(key);
        let ttl_secs = self.config.default_ttl_secs.max(1);
        let json = serde_json::to_string(value).map_err(|e| AppError::CacheError {
            message: format!("Failed to serialize value: {}", e),
        })?;

        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&full_key, &json, ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", full_key, e),
            })?;

        debug!(key = %full_key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.key(key);
        let mut conn = self.connection.write().await;

        let deleted: i32 = conn.del(&full_key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to delete key '{}': {}", full_key, e),
        })?;

        Ok(deleted > 0)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Cache key builder helpers
pub mod keys {
    /// Current user entry for a session token
    pub fn current_user(token: &str) -> String {
        format!("user:{}", super::hash_session_token(token))
    }
}

/// Resolved user and profile for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedUser {
    pub identity: Identity,
    pub profile: Profile,
}

/// Short-lived memo of "token → user + profile"
#[async_trait]
pub trait ProfileCache: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<CachedUser>>;

    async fn put(&self, token: &str, user: &CachedUser) -> Result<()>;

    async fn invalidate(&self, token: &str) -> Result<()>;

    /// Backend reachability for readiness checks; local caches are always up
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the configured cache
pub async fn from_settings(settings: &CacheSettings) -> Result<Arc<dyn ProfileCache>> {
    let ttl = Duration::from_secs(settings.ttl_secs);

    match settings.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryProfileCache::new(ttl))),
        CacheBackend::Disabled => Ok(Arc::new(DisabledProfileCache)),
        CacheBackend::Redis => {
            let url = settings.redis_url.clone().ok_or_else(|| AppError::Configuration {
                message: "cache.redis_url is required for the redis backend".to_string(),
            })?;
            let cache = Cache::new(CacheConfig {
                url,
                default_ttl_secs: settings.ttl_secs,
                key_prefix: settings.key_prefix.clone(),
            })
            .await?;
            Ok(Arc::new(RedisProfileCache::new(cache)))
        }
    }
}

/// Process-local map with a bounded TTL
///
/// Expired entries are dropped when their token is read, and every other
/// expired entry goes in a sweep that runs at most once per TTL.
pub struct MemoryProfileCache {
    ttl: Duration,
    inner: RwLock<MemoryEntries>,
}

struct MemoryEntries {
    entries: HashMap<String, (Instant, CachedUser)>,
    last_sweep: Instant,
}

impl MemoryEntries {
    fn sweep(&mut self, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        self.last_sweep = Instant::now();
        before - self.entries.len()
    }

    fn sweep_if_due(&mut self, ttl: Duration) {
        if self.last_sweep.elapsed() >= ttl {
            let removed = self.sweep(ttl);
            if removed > 0 {
                debug!(removed, "Swept expired profile cache entries");
            }
        }
    }
}

impl MemoryProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(MemoryEntries {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.inner.write().await.sweep(self.ttl)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl ProfileCache for MemoryProfileCache {
    async fn get(&self, token: &str) -> Result<Option<CachedUser>> {
        let key = keys::current_user(token);
        let mut inner = self.inner.write().await;
        inner.sweep_if_due(self.ttl);

        let hit = match inner.entries.get(&key) {
            Some((stored, user)) if stored.elapsed() < self.ttl => Some(user.clone()),
            Some(_) => {
                inner.entries.remove(&key);
                None
            }
            None => None,
        };

        record_cache(hit.is_some(), "profile_memory");
        Ok(hit)
    }

    async fn put(&self, token: &str, user: &CachedUser) -> Result<()> {
        if self.ttl.is_zero() {
            return Ok(());
        }
        let mut inner = self.inner.write().await;
        inner.sweep_if_due(self.ttl);
        inner
            .entries
            .insert(keys::current_user(token), (Instant::now(), user.clone()));
        Ok(())
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        self.inner.write().await.entries.remove(&keys::current_user(token));
        Ok(())
    }
}

/// Shared cache for multi-instance deployments
pub struct RedisProfileCache {
    cache: Cache,
}

impl RedisProfileCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ProfileCache for RedisProfileCache {
    async fn get(&self, token: &str) -> Result<Option<CachedUser>> {
        let hit = self.cache.get::<CachedUser>(&keys::current_user(token)).await?;
        record_cache(hit.is_some(), "profile_redis");
        Ok(hit)
    }

    async fn put(&self, token: &str, user: &CachedUser) -> Result<()> {
        self.cache.set(&keys::current_user(token), user).await
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        self.cache.delete(&keys::current_user(token)).await.map(|_| ())
    }

    async fn ping(&self) -> Result<()> {
        self.cache.ping().await
    }
}

/// Always misses; every request resolves the user afresh
pub struct DisabledProfileCache;

#[async_trait]
impl ProfileCache for DisabledProfileCache {
    async fn get(&self, _token: &str) -> Result<Option<CachedUser>> {
        Ok(None)
    }

    async fn put(&self, _token: &str, _user: &CachedUser) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AdminType, Role};
    use uuid::Uuid;

    fn user() -> CachedUser {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now().into();
        CachedUser {
            identity: Identity {
                user_id: id,
                email: Some("m@example.com".to_string()),
            },
            profile: Profile {
                id,
                email: "m@example.com".to_string(),
                full_name: "Min".to_string(),
                role_type: Role::Mentee,
                admin_type: AdminType::User,
                intro: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn test_key_never_contains_token() {
        let key = keys::current_user("secret-token");
        assert!(key.starts_with("user:"));
        assert!(!key.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_memory_cache_hit_and_invalidate() {
        let cache = MemoryProfileCache::new(Duration::from_secs(5));
        let user = user();

        assert!(cache.get("t").await.unwrap().is_none());
        cache.put("t", &user).await.unwrap();
        assert_eq!(cache.get("t").await.unwrap(), Some(user));
        assert!(cache.get("other").await.unwrap().is_none());

        cache.invalidate("t").await.unwrap();
        assert!(cache.get("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryProfileCache::new(Duration::from_millis(20));
        cache.put("t", &user()).await.unwrap();
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.get("t").await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_other_tokens() {
        let cache = MemoryProfileCache::new(Duration::from_millis(100));
        let user = user();
        for i in 0..200 {
            cache.put(&format!("token-{}", i), &user).await.unwrap();
        }
        assert_eq!(cache.len().await, 200);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get("new").await.unwrap().is_none());
        assert!(cache.is_empty().await);

        for i in 0..10 {
            cache.put(&format!("late-{}", i), &user).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        cache.put("fresh", &user).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let cache = DisabledProfileCache;
        cache.put("t", &user()).await.unwrap();
        assert!(cache.get("t").await.unwrap().is_none());
    }
}
