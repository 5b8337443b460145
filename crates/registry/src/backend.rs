//! Registry backends
//!
//! Content-addressed readers mapping an opaque schema key to a JSON Schema
//! document. One backend is active per collector, selected by the tagged
//! `[registry]` config variant.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use buz_config::RegistryConfig;
use parking_lot::RwLock;

use crate::BackendError;

/// Capability set every registry backend implements
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Fetch the raw schema document under a key
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError>;

    /// List all known schema keys
    async fn list(&self) -> Result<Vec<String>, BackendError>;

    /// Release backend resources
    async fn close(&self) -> Result<(), BackendError>;

    /// Backend type name, for logs and the route overview
    fn type_name(&self) -> &'static str;
}

/// Build the configured backend
pub fn build_backend(config: &RegistryConfig) -> Result<Box<dyn RegistryBackend>, BackendError> {
    match config {
        RegistryConfig::Fs { root, .. } => Ok(Box::new(FsBackend::new(root))),
        RegistryConfig::Http { base_url, .. } => Ok(Box::new(HttpBackend::new(base_url)?)),
        RegistryConfig::Memory { .. } => Ok(Box::new(MemoryBackend::new())),
    }
}

// =============================================================================
// Filesystem backend
// =============================================================================

/// Local filesystem registry rooted at a directory
///
/// Keys are relative paths under the root (`com.acme/click/jsonschema/1-0-0`
/// resolves to `<root>/com.acme/click/jsonschema/1-0-0`).
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to a path, rejecting traversal outside the root
    fn resolve(&self, key: &str) -> Result<PathBuf, BackendError> {
        let rel = Path::new(key);
        if rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(BackendError::NotFound(key.into()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl RegistryBackend for FsBackend {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::NotFound(key.into()))
            }
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    keys.push(rel.to_string_lossy().into_owned());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "fs"
    }
}

// =============================================================================
// HTTP backend
// =============================================================================

/// Remote HTTP registry
///
/// Schema keys are appended to the base URL as path segments. A 404 maps to
/// `NotFound`; any other non-success status or transport failure maps to
/// `Transport` (and ultimately a transient `SchemaUnavailable` verdict).
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend against the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl RegistryBackend for HttpBackend {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(self.url_for(key))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(key.into()));
        }
        if !response.status().is_success() {
            return Err(BackendError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "http"
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// In-memory registry, seedable and instrumented
///
/// Primarily for tests and embedded use. The optional latency and the fetch
/// counter let tests observe cache coalescing: fire N concurrent gets
/// against a slow backend and assert `fetch_count() == 1`.
#[derive(Default)]
pub struct MemoryBackend {
    schemas: RwLock<HashMap<String, Vec<u8>>>,
    latency: Option<Duration>,
    fetches: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Add artificial latency to every `get` (test coalescing windows)
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a schema document
    pub fn insert(&self, key: impl Into<String>, document: impl Into<Vec<u8>>) {
        self.schemas.write().insert(key.into(), document.into());
    }

    /// Remove a schema document
    pub fn remove(&self, key: &str) {
        self.schemas.write().remove(key);
    }

    /// How many `get` calls reached this backend
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.fetches.fetch_add(1, Ordering::Relaxed);

        self.schemas
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.into()))
    }

    async fn list(&self) -> Result<Vec<String>, BackendError> {
        let mut keys: Vec<String> = self.schemas.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_and_list() {
        let backend = MemoryBackend::new();
        backend.insert("b/key", br#"{"type":"object"}"#.to_vec());
        backend.insert("a/key", br#"{}"#.to_vec());

        let bytes = backend.get("b/key").await.unwrap();
        assert_eq!(bytes, br#"{"type":"object"}"#);

        let keys = backend.list().await.unwrap();
        assert_eq!(keys, vec!["a/key", "b/key"]);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_missing_key() {
        let backend = MemoryBackend::new();
        let err = backend.get("nope").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fs_get() {
        let dir = tempfile::tempdir().unwrap();
        let schema_dir = dir.path().join("com.acme/click/jsonschema");
        std::fs::create_dir_all(&schema_dir).unwrap();
        std::fs::write(schema_dir.join("1-0-0"), br#"{"type":"object"}"#).unwrap();

        let backend = FsBackend::new(dir.path());
        let bytes = backend
            .get("com.acme/click/jsonschema/1-0-0")
            .await
            .unwrap();
        assert_eq!(bytes, br#"{"type":"object"}"#);
    }

    #[tokio::test]
    async fn test_fs_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        let err = backend.get("missing/schema").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fs_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        let err = backend.get("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fs_list_recurses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/1-0-0"), b"{}").unwrap();
        std::fs::write(dir.path().join("top"), b"{}").unwrap();

        let backend = FsBackend::new(dir.path());
        let keys = backend.list().await.unwrap();
        assert_eq!(keys, vec!["a/b/1-0-0".to_string(), "top".to_string()]);
    }

    #[test]
    fn test_http_url_building() {
        let backend = HttpBackend::new("https://registry.example.com/schemas/").unwrap();
        assert_eq!(
            backend.url_for("/com.acme/click"),
            "https://registry.example.com/schemas/com.acme/click"
        );
    }
}
