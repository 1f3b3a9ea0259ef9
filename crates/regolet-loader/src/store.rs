//! Object-storage policy loader (S3, local filesystem, in-memory).
//!
//! Keys follow the policy path under an optional prefix:
//!
//! ```text
//! {prefix}/policies/auth/user.rego
//! ```
//!
//! Whatever is fetched is kept for the life of the loader; there is no expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::error::{LoadError, LoadResult};
use crate::key::to_path;
use crate::loader::PolicyLoader;

/// Loads policies from an `object_store` backend and caches them in memory.
pub struct ObjectStorePolicyLoader {
    inner: Arc<dyn ObjectStore>,
    prefix: String,
    cache: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for ObjectStorePolicyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorePolicyLoader")
            .field("store", &self.inner.to_string())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStorePolicyLoader {
    /// Wrap an existing store; `prefix` is prepended to every policy key.
    pub fn with_store(inner: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            inner,
            prefix: prefix.trim_matches('/').to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// In-memory store, for tests.
    pub fn memory() -> Self {
        Self::with_store(Arc::new(object_store::memory::InMemory::new()), "")
    }

    /// S3 bucket, with credentials and region read from the AWS environment.
    pub fn s3(bucket: &str, prefix: &str, region: Option<&str>) -> LoadResult<Self> {
        let mut builder = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_allow_http(false);

        if let Some(region) = region {
            builder = builder.with_region(region);
        }

        let store = builder.build().map_err(|e| LoadError::Config {
            message: format!("failed to create S3 client: {}", e),
        })?;

        Ok(Self::with_store(Arc::new(store), prefix))
    }

    /// Create a loader from a store URL.
    ///
    /// ```text
    /// s3://my-bucket/opa?region=eu-west-1
    /// file:///srv/policies
    /// memory://
    /// ```
    pub fn from_url(location: &str) -> LoadResult<Self> {
        let invalid = |reason: String| LoadError::Config {
            message: format!("invalid store URL '{}': {}", location, reason),
        };

        let url = url::Url::parse(location).map_err(|e| invalid(e.to_string()))?;
        let path = url.path().trim_start_matches('/');

        match url.scheme() {
            "memory" => Ok(Self::memory()),
            "file" => {
                let root = format!("/{}", path);
                let store = object_store::local::LocalFileSystem::new_with_prefix(&root)
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(Self::with_store(Arc::new(store), ""))
            }
            "s3" => {
                let bucket = url
                    .host_str()
                    .ok_or_else(|| invalid("S3 URL must include bucket name".to_string()))?;
                let region = url
                    .query_pairs()
                    .find(|(k, _)| k == "region")
                    .map(|(_, v)| v.to_string());
                Self::s3(bucket, path, region.as_deref())
            }
            scheme => Err(invalid(format!("unsupported scheme: {}", scheme))),
        }
    }

    fn object_key(&self, filename: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(filename)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, filename))
        }
    }

    async fn fetch(&self, policy_name: &str, key: &ObjectPath) -> LoadResult<String> {
        let result = self.inner.get(key).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => LoadError::NotFound {
                name: policy_name.to_string(),
            },
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => LoadError::Unauthorized {
                message: e.to_string(),
            },
            _ => LoadError::Unreachable {
                message: format!("failed to get policy {}: {}", policy_name, e),
            },
        })?;

        let bytes = result.bytes().await.map_err(|e| LoadError::Unreachable {
            message: format!("failed to read policy {}: {}", policy_name, e),
        })?;

        String::from_utf8(bytes.to_vec()).map_err(|e| LoadError::Corrupt {
            message: format!("policy {} is not valid UTF-8: {}", policy_name, e),
        })
    }
}

#[async_trait]
impl PolicyLoader for ObjectStorePolicyLoader {
    async fn load(&self, policy_name: &str) -> LoadResult<String> {
        let filename = to_path(policy_name)?;

        if let Some(module) = self.cache.read().await.get(policy_name) {
            debug!(policy = %policy_name, "serving policy from memory");
            return Ok(module.clone());
        }

        let key = self.object_key(&filename);
        let module = self.fetch(policy_name, &key).await.inspect_err(|e| {
            error!(policy = %policy_name, key = %key, error = %e, "failed to get policy");
        })?;

        self.cache
            .write()
            .await
            .insert(policy_name.to_string(), module.clone());

        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use object_store::PutPayload;

    use super::*;

    async fn put(store: &Arc<dyn ObjectStore>, key: &str, content: &str) {
        store
            .put(
                &ObjectPath::from(key),
                PutPayload::from_bytes(Bytes::from(content.to_string())),
            )
            .await
            .expect("put failed");
    }

    #[tokio::test]
    async fn test_load_from_memory_store() {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        put(&store, "policies/auth/user.rego", "package auth.user").await;

        let loader = ObjectStorePolicyLoader::with_store(store, "");
        assert_eq!(loader.load("auth.user").await.unwrap(), "package auth.user");
    }

    #[tokio::test]
    async fn test_prefix_applied() {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        put(&store, "opa/policies/example.rego", "package example").await;

        let loader = ObjectStorePolicyLoader::with_store(store, "/opa/");
        assert_eq!(loader.load("example").await.unwrap(), "package example");
    }

    #[tokio::test]
    async fn test_result_cached_without_expiry() {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        put(&store, "policies/example.rego", "package example").await;

        let loader = ObjectStorePolicyLoader::with_store(Arc::clone(&store), "");
        loader.load("example").await.unwrap();

        store
            .delete(&ObjectPath::from("policies/example.rego"))
            .await
            .unwrap();

        assert_eq!(loader.load("example").await.unwrap(), "package example");
    }

    #[tokio::test]
    async fn test_missing_policy() {
        let loader = ObjectStorePolicyLoader::memory();
        let err = loader.load("missing").await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound { name } if name == "missing"));
    }

    #[tokio::test]
    async fn test_invalid_name() {
        let loader = ObjectStorePolicyLoader::memory();
        assert!(matches!(
            loader.load("a/b").await,
            Err(LoadError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_cache() {
        let store: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        put(&store, "policies/a.rego", "package a").await;
        put(&store, "policies/b.rego", "package b").await;

        let loader = Arc::new(ObjectStorePolicyLoader::with_store(store, ""));
        let mut handles = Vec::new();
        for i in 0..16 {
            let loader = Arc::clone(&loader);
            let name = if i % 2 == 0 { "a" } else { "b" };
            handles.push(tokio::spawn(async move {
                (name, loader.load(name).await.unwrap())
            }));
        }

        for handle in handles {
            let (name, module) = handle.await.unwrap();
            assert_eq!(module, format!("package {}", name));
        }
        assert_eq!(loader.cache.read().await.len(), 2);
    }

    #[test]
    fn test_from_url_rejects_unknown_scheme() {
        assert!(matches!(
            ObjectStorePolicyLoader::from_url("ftp://host/path"),
            Err(LoadError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_url_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let policy = temp_dir.path().join("policies/example.rego");
        std::fs::create_dir_all(policy.parent().unwrap()).unwrap();
        std::fs::write(&policy, "package example").unwrap();

        let url = format!("file://{}", temp_dir.path().display());
        let loader = ObjectStorePolicyLoader::from_url(&url).unwrap();
        assert_eq!(loader.load("example").await.unwrap(), "package example");
    }
}
