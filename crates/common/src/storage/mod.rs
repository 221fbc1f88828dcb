//! Object storage abstraction
//!
//! Uploaded manuscripts and catalog covers live outside the database. The
//! store is opaque to the services:
//! - Local filesystem (single node, development)
//! - Hosted storage REST API over HTTP
//! - In-memory (tests)

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path`; an existing object at the same path is an error
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Publicly reachable URL for an object
    fn public_url(&self, path: &str) -> String;

    /// Remove objects; missing objects are not an error
    async fn remove(&self, paths: &[String]) -> Result<()>;

    /// Backend name for logs
    fn backend_name(&self) -> &str;
}

/// Build the configured store
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(
            &config.root,
            &config.public_base_url,
        ))),
        StorageBackend::Http => {
            let api_base = config.api_base.clone().ok_or_else(|| AppError::Configuration {
                message: "storage.api_base is required for the http backend".to_string(),
            })?;
            let service_key = config.service_key.clone().ok_or_else(|| AppError::Configuration {
                message: "storage.service_key is required for the http backend".to_string(),
            })?;

            Ok(Arc::new(HttpObjectStore::new(
                api_base,
                config.bucket.clone(),
                service_key,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
    }
}

// ============================================================================
// Object paths
// ============================================================================

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static pattern"))
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars().replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{actor}/{article}/v{n}/{file}`
pub fn version_path(actor_id: Uuid, article_id: Uuid, version_number: i32, file_name: &str) -> String {
    format!(
        "{}/{}/v{}/{}",
        actor_id,
        article_id,
        version_number,
        sanitize_file_name(file_name)
    )
}

/// `issues/{id}/{file}`
pub fn issue_cover_path(issue_id: Uuid, file_name: &str) -> String {
    format!("issues/{}/{}", issue_id, sanitize_file_name(file_name))
}

/// `volumes/{id}/{file}`
pub fn volume_cover_path(volume_id: Uuid, file_name: &str) -> String {
    format!("volumes/{}/{}", volume_id, sanitize_file_name(file_name))
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

// ============================================================================
// Local filesystem
// ============================================================================

/// Files under a root directory, served by whatever fronts `public_base_url`
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, path: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // create_new: an existing object is never overwritten
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to create {}: {}", path, e),
            })?;

        file.write_all(&data).await?;
        file.flush().await?;

        debug!(path, bytes = data.len(), "Stored object on disk");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        join_url(&self.public_base_url, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let removals = paths.iter().map(|path| {
            let target = self.root.join(path);
            async move {
                match tokio::fs::remove_file(&target).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(AppError::from(e)),
                }
            }
        });

        futures::future::try_join_all(removals).await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

// ============================================================================
// Hosted storage API
// ============================================================================

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

/// REST storage API of the hosted backend (bucket + bearer service key)
pub struct HttpObjectStore {
    client: reqwest::Client,
    api_base: String,
    bucket: String,
    service_key: String,
}

impl HttpObjectStore {
    pub fn new(api_base: String, bucket: String, service_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bucket,
            service_key,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.api_base, self.bucket, path)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Storage {
            message: format!("{} failed with {}: {}", action, status, body),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let bytes = data.len();
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;

        Self::check(response, "Upload").await?;
        debug!(path, bytes, bucket = %self.bucket, "Uploaded object");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.api_base, self.bucket, path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .delete(format!("{}/object/{}", self.api_base, self.bucket))
            .bearer_auth(&self.service_key)
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await?;

        Self::check(response, "Remove").await
    }

    fn backend_name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Process-local store for tests and local runs
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail with a storage error
    pub fn set_failing(&self, failing: bool) {
        self.fail_uploads.store(failing, Ordering::SeqCst);
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::Storage {
                message: format!("Upload of {} rejected", path),
            });
        }

        let mut objects = self.objects.write().await;
        if objects.contains_key(path) {
            return Err(AppError::Storage {
                message: format!("Object already exists: {}", path),
            });
        }

        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        join_url("memory://objects", path)
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write().await;
        for path in paths {
            if objects.remove(path).is_none() {
                warn!(path = %path, "Removing unknown object");
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("x.pdf"), "x.pdf");
        assert_eq!(sanitize_file_name("my paper (final).pdf"), "my_paper__final_.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\논문.pdf"), "__.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn test_object_paths() {
        let actor = Uuid::new_v4();
        let article = Uuid::new_v4();

        assert_eq!(
            version_path(actor, article, 3, "draft v2.pdf"),
            format!("{}/{}/v3/draft_v2.pdf", actor, article)
        );

        let issue = Uuid::new_v4();
        assert_eq!(issue_cover_path(issue, "cover.png"), format!("issues/{}/cover.png", issue));

        let volume = Uuid::new_v4();
        assert!(volume_cover_path(volume, "c.jpg").starts_with("volumes/"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryObjectStore::new();

        assert_ok!(store.upload("a/b.pdf", b"pdf".to_vec(), "application/pdf").await);
        assert_err!(store.upload("a/b.pdf", b"again".to_vec(), "application/pdf").await);
        assert_eq!(store.public_url("a/b.pdf"), "memory://objects/a/b.pdf");

        let stored = store.get("a/b.pdf").await.unwrap();
        assert_eq!(stored.data, b"pdf");

        assert_ok!(store.remove(&["a/b.pdf".to_string(), "missing".to_string()]).await);
        assert!(store.paths().await.is_empty());

        store.set_failing(true);
        assert_err!(store.upload("c.pdf", Vec::new(), "application/pdf").await);
    }

    #[tokio::test]
    async fn test_local_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("minjok-store-{}", Uuid::new_v4()));
        let store = LocalObjectStore::new(&root, "http://localhost:8080/files/");

        assert_ok!(store.upload("x/v1/x.pdf", b"data".to_vec(), "application/pdf").await);
        assert_err!(store.upload("x/v1/x.pdf", b"data".to_vec(), "application/pdf").await);
        assert_eq!(
            store.public_url("x/v1/x.pdf"),
            "http://localhost:8080/files/x/v1/x.pdf"
        );

        assert_ok!(store.remove(&["x/v1/x.pdf".to_string()]).await);
        assert!(!root.join("x/v1/x.pdf").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
