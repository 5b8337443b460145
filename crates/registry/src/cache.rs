//! Schema cache
//!
//! A read-mostly map from schema key to resolved entry. Concurrent misses
//! on the same key coalesce behind a single in-flight fetch; distinct keys
//! resolve independently.
//!
//! # Locking
//!
//! The outer map is a `parking_lot::RwLock` held only for lookups and
//! inserts, never across await points. The per-key `tokio::sync::OnceCell`
//! serializes the fetch itself: the first caller runs the backend get and
//! compile, everyone else suspends until the entry is published.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use buz_config::RegistryConfig;
use chrono::Utc;
use jsonschema::Draft;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::backend::build_backend;
use crate::{BackendError, CachedSchema, RegistryBackend, RegistryError};

type Slot = Arc<OnceCell<Arc<CachedSchema>>>;

/// Coalescing schema cache over a registry backend
pub struct SchemaCache {
    backend: Box<dyn RegistryBackend>,
    ttl: Option<Duration>,
    fetch_timeout: Duration,
    entries: RwLock<HashMap<String, Slot>>,
    stats: CacheStats,
}

/// Atomic cache counters
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    fetches: AtomicU64,
    fetch_errors: AtomicU64,
    compile_errors: AtomicU64,
    purges: AtomicU64,
}

/// Point-in-time snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Gets served from an existing entry
    pub hits: u64,
    /// Backend fetches initiated
    pub fetches: u64,
    /// Fetches that failed (transport, timeout, not found)
    pub fetch_errors: u64,
    /// Documents that failed to compile
    pub compile_errors: u64,
    /// Times the cache was purged
    pub purges: u64,
    /// Entries currently cached
    pub entries: u64,
}

impl SchemaCache {
    /// Create a cache over an explicit backend
    pub fn new(backend: Box<dyn RegistryBackend>, ttl: Option<Duration>, fetch_timeout: Duration) -> Self {
        Self {
            backend,
            ttl,
            fetch_timeout,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Build the configured backend and wrap it in a cache
    pub fn build(config: &RegistryConfig, fetch_timeout: Duration) -> Result<Self, BackendError> {
        let backend = build_backend(config)?;
        tracing::info!(backend = backend.type_name(), ttl = ?config.cache_ttl(), "registry initialized");
        Ok(Self::new(backend, config.cache_ttl(), fetch_timeout))
    }

    /// Backend type name
    pub fn backend_type(&self) -> &'static str {
        self.backend.type_name()
    }

    /// Resolve a key to a compiled schema
    ///
    /// Returns the cached entry when present and unexpired; otherwise
    /// fetches from the backend, compiles, caches, and returns. A cached
    /// compile failure surfaces as `CompileFailed` without touching the
    /// backend again.
    pub async fn get(&self, key: &str) -> Result<Arc<CachedSchema>, RegistryError> {
        loop {
            let slot = self.slot_for(key);

            if let Some(entry) = slot.get() {
                if let Some(ttl) = self.ttl {
                    if entry.is_expired(ttl, Utc::now()) {
                        self.evict_slot(key, &slot);
                        continue;
                    }
                }
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Self::entry_verdict(Arc::clone(entry));
            }

            match slot
                .get_or_try_init(|| self.fetch_and_compile(key))
                .await
            {
                Ok(entry) => return Self::entry_verdict(Arc::clone(entry)),
                Err(err) => {
                    // Fetch failures are not cached - drop the slot so the
                    // next caller retries against the backend.
                    self.evict_slot(key, &slot);
                    return Err(err);
                }
            }
        }
    }

    /// Raw document bytes for the ops schema endpoint
    ///
    /// Serves from cache when present (even for entries that failed to
    /// compile); otherwise fetches from the backend without caching.
    pub async fn schema(&self, key: &str) -> Result<Vec<u8>, RegistryError> {
        let cached = self
            .entries
            .read()
            .get(key)
            .and_then(|slot| slot.get().map(|e| e.raw.clone()));
        if let Some(raw) = cached {
            return Ok(raw);
        }

        match timeout(self.fetch_timeout, self.backend.get(key)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(RegistryError::from_backend(key, e)),
            Err(_) => Err(RegistryError::FetchFailed {
                key: key.into(),
                cause: "fetch timed out".into(),
            }),
        }
    }

    /// List all keys known to the backend
    pub async fn list(&self) -> Result<Vec<String>, BackendError> {
        self.backend.list().await
    }

    /// Atomically empty the cache
    ///
    /// Resolutions in flight at purge time still complete for their
    /// waiters, but new gets start from a clean slate.
    pub fn purge(&self) {
        let evicted = {
            let mut entries = self.entries.write();
            let n = entries.len();
            entries.clear();
            n
        };
        self.stats.purges.fetch_add(1, Ordering::Relaxed);
        tracing::info!(evicted, "schema cache purged");
    }

    /// Counter snapshot for the ops stats endpoint
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            fetch_errors: self.stats.fetch_errors.load(Ordering::Relaxed),
            compile_errors: self.stats.compile_errors.load(Ordering::Relaxed),
            purges: self.stats.purges.load(Ordering::Relaxed),
            entries: self.entries.read().len() as u64,
        }
    }

    /// Close the underlying backend
    pub async fn close(&self) -> Result<(), BackendError> {
        self.backend.close().await
    }

    /// Get or create the slot for a key
    fn slot_for(&self, key: &str) -> Slot {
        if let Some(slot) = self.entries.read().get(key) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key.to_string()).or_default())
    }

    /// Remove a slot iff the map still holds this exact slot
    ///
    /// Guarded by pointer identity so a purge-then-refetch that raced us is
    /// left alone.
    fn evict_slot(&self, key: &str, slot: &Slot) {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            entries.remove(key);
        }
    }

    /// Map a cached entry to the get() contract
    fn entry_verdict(entry: Arc<CachedSchema>) -> Result<Arc<CachedSchema>, RegistryError> {
        match &entry.compile_error {
            Some(cause) => Err(RegistryError::CompileFailed {
                key: entry.key.clone(),
                cause: cause.clone(),
            }),
            None => Ok(entry),
        }
    }

    /// Fetch one document and compile it
    ///
    /// Compile failures produce an Ok entry carrying the error text, so the
    /// failure itself is cached. Fetch failures produce Err and nothing is
    /// cached.
    async fn fetch_and_compile(&self, key: &str) -> Result<Arc<CachedSchema>, RegistryError> {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);

        let fetched = match timeout(self.fetch_timeout, self.backend.get(key)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(RegistryError::from_backend(key, e)),
            Err(_) => Err(RegistryError::FetchFailed {
                key: key.into(),
                cause: "fetch timed out".into(),
            }),
        };
        let raw = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.fetch_errors.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, error = %e, "schema fetch failed");
                return Err(e);
            }
        };

        let (validator, compile_error) = match serde_json::from_slice::<serde_json::Value>(&raw) {
            Err(e) => (None, Some(format!("invalid JSON: {e}"))),
            Ok(document) => match jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&document)
            {
                Ok(validator) => (Some(validator), None),
                Err(e) => (None, Some(e.to_string())),
            },
        };

        if let Some(cause) = &compile_error {
            self.stats.compile_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key, cause, "schema failed to compile; failure cached");
        } else {
            tracing::debug!(key, bytes = raw.len(), "schema compiled and cached");
        }

        Ok(Arc::new(CachedSchema {
            key: key.to_string(),
            fetched_at: Utc::now(),
            raw,
            validator,
            compile_error,
        }))
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("backend", &self.backend.type_name())
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
