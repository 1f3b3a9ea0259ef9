//! Policy loader backed by an HTTP policy service.
//!
//! Each policy name gets its own cache entry behind its own lock:
//!
//! 1. Fresh entry (`now < next_sync`): served from memory, no network.
//! 2. Otherwise a conditional GET revalidates it (`If-None-Match`).
//! 3. Refresh failed but the entry was loaded before: the stale copy is served.
//! 4. Refresh failed and nothing was loaded: the persisted copy on disk is adopted.
//! 5. Nothing usable: the refresh error is returned.
//!
//! Revalidation is lazy; there is no background task. The per-key lock is
//! held across the network call, so concurrent callers of a stale key wait
//! for one refresh and then see the fresh entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{LoadError, LoadResult};
use crate::key::to_path;
use crate::loader::PolicyLoader;

mod http;
mod persist;
mod schedule;

use http::{FetchOutcome, HttpBackend};

const USER_AGENT_VALUE: &str = concat!("regolet/", env!("CARGO_PKG_VERSION"));

/// Per-policy cache state.
#[derive(Debug)]
struct CacheEntry {
    module: Option<String>,
    etag: Option<String>,
    next_sync: Instant,
    loaded: bool,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            module: None,
            etag: None,
            next_sync: Instant::now(),
            loaded: false,
        }
    }

    fn fresh_module(&self) -> Option<&str> {
        if self.loaded && Instant::now() < self.next_sync {
            self.module.as_deref()
        } else {
            None
        }
    }

    fn loaded_module(&self) -> Option<&str> {
        if self.loaded {
            self.module.as_deref()
        } else {
            None
        }
    }
}

/// Loads `.rego` modules from an HTTP policy service API.
#[derive(Debug)]
pub struct PolicyServiceLoader {
    http: HttpBackend,
    base_url: String,
    resource_prefix: Option<String>,
    cache_dir: PathBuf,
    config: ServiceConfig,
    entries: Mutex<HashMap<String, Arc<Mutex<CacheEntry>>>>,
}

impl PolicyServiceLoader {
    pub fn new(config: ServiceConfig) -> LoadResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| LoadError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        let base_url = config.url.trim().trim_end_matches('/').to_string();
        let resource_prefix = config
            .resource_prefix
            .as_deref()
            .map(|p| p.trim().trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(String::from);
        let cache_dir = config.resolved_cache_dir();

        Ok(Self {
            http: HttpBackend {
                client,
                bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
            },
            base_url,
            resource_prefix,
            cache_dir,
            config,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Build from `POLICY_*` environment variables; `Ok(None)` when
    /// `POLICY_SERVICE_URL` is unset.
    pub fn from_env() -> LoadResult<Option<Self>> {
        ServiceConfig::from_env()?.map(Self::new).transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Names of policies that currently have a usable in-memory copy.
    pub async fn cached_policies(&self) -> Vec<String> {
        let handles: Vec<(String, Arc<Mutex<CacheEntry>>)> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut names = Vec::new();
        for (name, entry) in handles {
            if entry.lock().await.loaded {
                names.push(name);
            }
        }
        names.sort();
        names
    }

    /// Get or create the entry handle; the registry lock is released on return.
    async fn entry(&self, policy_name: &str) -> Arc<Mutex<CacheEntry>> {
        let mut entries = self.entries.lock().await;
        Arc::clone(
            entries
                .entry(policy_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CacheEntry::empty()))),
        )
    }

    fn policy_url(&self, filename: &str) -> String {
        match &self.resource_prefix {
            Some(prefix) => format!("{}/{}/{}", self.base_url, prefix, filename),
            None => format!("{}/{}", self.base_url, filename),
        }
    }

    fn reschedule(&self, entry: &mut CacheEntry) {
        entry.next_sync = schedule::next_sync(self.config.poll_min, self.config.poll_max);
    }

    async fn refresh(
        &self,
        policy_name: &str,
        filename: &str,
        entry: &mut CacheEntry,
    ) -> LoadResult<String> {
        let url = self.policy_url(filename);
        debug!(url = %url, etag = ?entry.etag, "revalidating policy");

        match self
            .http
            .fetch_policy(policy_name, &url, entry.etag.as_deref())
            .await?
        {
            FetchOutcome::NotModified => {
                let module = entry
                    .loaded_module()
                    .map(String::from)
                    .ok_or_else(|| LoadError::Unreachable {
                        message: format!(
                            "policy {} not downloaded yet; received 304 Not Modified",
                            policy_name
                        ),
                    })?;
                self.reschedule(entry);
                Ok(module)
            }
            FetchOutcome::Fetched(fetched) => {
                entry.module = Some(fetched.module.clone());
                entry.etag = fetched.etag;
                entry.loaded = true;
                self.reschedule(entry);
                info!(policy = %policy_name, etag = ?entry.etag, "downloaded policy");

                if self.config.persist {
                    if let Err(e) = self.persist(policy_name, &fetched.module).await {
                        warn!(policy = %policy_name, error = %e, "failed to persist policy");
                    }
                }

                Ok(fetched.module)
            }
        }
    }

    async fn persist(&self, policy_name: &str, module: &str) -> LoadResult<()> {
        let path = persist::persisted_path(&self.cache_dir, policy_name)?;
        persist::write_atomic(&path, module).await
    }

    async fn read_persisted(&self, policy_name: &str) -> LoadResult<String> {
        let path = persist::persisted_path(&self.cache_dir, policy_name)?;
        persist::read_persisted(&path).await
    }

    #[cfg(test)]
    async fn expire(&self, policy_name: &str) {
        let entry = self.entry(policy_name).await;
        entry.lock().await.next_sync = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap_or_else(Instant::now);
    }

    #[cfg(test)]
    async fn snapshot(&self, policy_name: &str) -> (bool, Option<String>, Option<String>) {
        let entry = self.entry(policy_name).await;
        let entry = entry.lock().await;
        (entry.loaded, entry.module.clone(), entry.etag.clone())
    }
}

#[async_trait]
impl PolicyLoader for PolicyServiceLoader {
    async fn load(&self, policy_name: &str) -> LoadResult<String> {
        let filename = to_path(policy_name)?;

        let handle = self.entry(policy_name).await;
        let mut entry = handle.lock().await;

        if let Some(module) = entry.fresh_module() {
            debug!(policy = %policy_name, "serving policy from memory");
            return Ok(module.to_string());
        }

        let err = match self.refresh(policy_name, &filename, &mut entry).await {
            Ok(module) => return Ok(module),
            Err(err) => err,
        };

        if err.allows_stale() {
            if let Some(module) = entry.loaded_module() {
                warn!(
                    policy = %policy_name,
                    error = %err,
                    "serving cached copy after refresh failure"
                );
                return Ok(module.to_string());
            }
        }

        if self.config.persist && !entry.loaded && err.allows_stale() {
            match self.read_persisted(policy_name).await {
                Ok(module) => {
                    warn!(
                        policy = %policy_name,
                        error = %err,
                        "serving persisted copy after refresh failure"
                    );
                    entry.module = Some(module.clone());
                    entry.etag = None;
                    entry.loaded = true;
                    self.reschedule(&mut entry);
                    return Ok(module);
                }
                Err(read_err) => {
                    debug!(policy = %policy_name, error = %read_err, "no persisted copy available");
                }
            }
        }

        Err(err)
    }
}
