use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread-safe TTL cache backed by `DashMap`.
///
/// Entries expire after the configured `ttl` and are lazily evicted on access.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Arc<DashMap<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// Create a new cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Get a cached value if it exists and hasn't expired.
    pub fn get(&self, key: &K) -> Option<V> {
        if let Some(entry) = self.inner.get(key) {
            let (val, inserted) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(val.clone());
            }
            // Expired — drop the read guard before removing
            drop(entry);
            self.inner.remove(key);
        }
        None
    }

    /// Insert or update a value in the cache.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, (value, Instant::now()));
    }

    /// Remove a specific entry from the cache.
    pub fn remove(&self, key: &K) {
        self.inner.remove(key);
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        self.inner.retain(|_, (_, inserted)| inserted.elapsed() < self.ttl);
    }
}

// ---------------------------------------------------------------------------
// CacheStore trait + InMemoryStore + global singleton
// ---------------------------------------------------------------------------

/// Pluggable cache backend trait.
///
/// Implement this to swap the default in-memory store for Redis, Memcached, etc.
/// Register your implementation at startup via [`set_cache_backend`].
pub trait CacheStore: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>>;
    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
    fn clear(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    fn remove_by_prefix<'a>(&'a self, prefix: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Default in-memory cache store backed by `DashMap`.
///
/// Each entry stores `(value, inserted_at, ttl)` and is lazily evicted on access.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<DashMap<String, (Bytes, Instant, Duration)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(entry) = self.inner.get(key) {
                let (val, inserted, ttl) = entry.value();
                if inserted.elapsed() < *ttl {
                    return Some(val.clone());
                }
                drop(entry);
                self.inner.remove(key);
            }
            None
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner.insert(key.to_string(), (value, Instant::now(), ttl));
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner.remove(key);
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.inner.clear();
        })
    }

    fn remove_by_prefix<'a>(&'a self, prefix: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner.retain(|k, _| !k.starts_with(prefix));
        })
    }
}

// ---------------------------------------------------------------------------
// Redis-backed store
// ---------------------------------------------------------------------------

/// Redis-backed cache store (`GET`/`SETEX`), shared across every gateway
/// instance pointed at the same Redis database — unlike [`InMemoryStore`],
/// which is per-process.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn connection(&self) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }
}

impl CacheStore for RedisStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = match self.connection().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(error = %err, "cache backend unavailable on get");
                    return None;
                }
            };
            let value: redis::RedisResult<Option<Vec<u8>>> =
                redis::cmd("GET").arg(key).query_async(&mut conn).await;
            match value {
                Ok(Some(bytes)) => Some(Bytes::from(bytes)),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(error = %err, key = %key, "cache GET failed");
                    None
                }
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = match self.connection().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(error = %err, "cache backend unavailable on set");
                    return;
                }
            };
            let ttl_secs = ttl.as_secs().max(1);
            let result: redis::RedisResult<()> = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(value.as_ref())
                .query_async(&mut conn)
                .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, key = %key, "cache SETEX failed");
            }
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(mut conn) = self.connection().await {
                let _: redis::RedisResult<()> = redis::cmd("DEL").arg(key).query_async(&mut conn).await;
            }
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            tracing::warn!("RedisStore::clear is a no-op; use remove_by_prefix or flush the database out of band");
        })
    }

    fn remove_by_prefix<'a>(&'a self, prefix: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut conn = match self.connection().await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(error = %err, "cache backend unavailable on remove_by_prefix");
                    return;
                }
            };
            let pattern = format!("{prefix}*");
            let keys: redis::RedisResult<Vec<String>> =
                redis::cmd("KEYS").arg(&pattern).query_async(&mut conn).await;
            if let Ok(keys) = keys {
                if !keys.is_empty() {
                    let _: redis::RedisResult<()> =
                        redis::cmd("DEL").arg(&keys).query_async(&mut conn).await;
                }
            }
        })
    }
}

// Global singleton
use std::sync::OnceLock;

static CACHE_BACKEND: OnceLock<Arc<dyn CacheStore>> = OnceLock::new();

/// Set a custom cache backend. Must be called before any cache operations.
/// Typically called once at application startup.
pub fn set_cache_backend(store: impl CacheStore) {
    let _ = CACHE_BACKEND.set(Arc::new(store));
}

/// Get the current cache backend. Defaults to [`InMemoryStore`] if none was set.
pub fn cache_backend() -> Arc<dyn CacheStore> {
    CACHE_BACKEND
        .get()
        .cloned()
        .unwrap_or_else(|| {
            // Lazy-init with InMemoryStore on first access
            let store: Arc<dyn CacheStore> = Arc::new(InMemoryStore::new());
            // Try to set it; if another thread beat us, use theirs
            let _ = CACHE_BACKEND.set(store.clone());
            CACHE_BACKEND.get().cloned().unwrap_or(store)
        })
}
