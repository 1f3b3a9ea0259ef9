//! Configuration for the HTTP policy-service loader.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{LoadError, LoadResult};

/// Default lower bound of the revalidation interval.
pub const DEFAULT_POLL_MIN: Duration = Duration::from_secs(10);

/// Default upper bound of the revalidation interval.
pub const DEFAULT_POLL_MAX: Duration = Duration::from_secs(30);

/// Default per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Policy service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Base URL of the policy service.
    pub url: String,

    /// Path segment inserted between the base URL and the policy path.
    pub resource_prefix: Option<String>,

    /// Bearer credential sent as `Authorization` header.
    pub bearer_token: Option<String>,

    /// Whether fetched policies are persisted for the on-disk fallback.
    pub persist: bool,

    /// Persistence directory. Defaults to `$TMPDIR/.opa/policies`.
    pub cache_dir: Option<PathBuf>,

    /// Minimum revalidation interval.
    pub poll_min: Duration,

    /// Maximum revalidation interval.
    pub poll_max: Duration,

    /// Timeout for each network attempt.
    pub http_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            resource_prefix: None,
            bearer_token: None,
            persist: true,
            cache_dir: None,
            poll_min: DEFAULT_POLL_MIN,
            poll_max: DEFAULT_POLL_MAX,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    /// Create a config for the given service URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    /// Create config from environment variables.
    ///
    /// Returns `Ok(None)` when `POLICY_SERVICE_URL` is unset or blank, which
    /// means the HTTP backend is disabled.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `POLICY_SERVICE_URL` | Service base URL |
    /// | `POLICY_RESOURCE_PREFIX` | Path segment before the policy path |
    /// | `POLICY_BEARER_TOKEN` | Bearer credential |
    /// | `POLICY_PERSIST` | Enable on-disk fallback (default: true) |
    /// | `POLICY_CACHE_DIR` | Persistence directory |
    /// | `POLICY_POLL_MIN_SECONDS` | Minimum revalidation interval (default: 10) |
    /// | `POLICY_POLL_MAX_SECONDS` | Maximum revalidation interval (default: 30) |
    /// | `POLICY_HTTP_TIMEOUT_SECONDS` | Request timeout (default: 15) |
    pub fn from_env() -> LoadResult<Option<Self>> {
        let Some(url) = env_non_empty("POLICY_SERVICE_URL") else {
            return Ok(None);
        };

        let persist = match env_non_empty("POLICY_PERSIST") {
            Some(raw) => parse_bool("POLICY_PERSIST", &raw)?,
            None => true,
        };

        Ok(Some(Self {
            url,
            resource_prefix: env_non_empty("POLICY_RESOURCE_PREFIX"),
            bearer_token: env_non_empty("POLICY_BEARER_TOKEN"),
            persist,
            cache_dir: env_non_empty("POLICY_CACHE_DIR").map(PathBuf::from),
            poll_min: duration_from_env("POLICY_POLL_MIN_SECONDS", DEFAULT_POLL_MIN)?,
            poll_max: duration_from_env("POLICY_POLL_MAX_SECONDS", DEFAULT_POLL_MAX)?,
            http_timeout: duration_from_env("POLICY_HTTP_TIMEOUT_SECONDS", DEFAULT_HTTP_TIMEOUT)?,
        }))
    }

    /// Check the invariants the loader relies on.
    pub fn validate(&self) -> LoadResult<()> {
        if self.url.trim().is_empty() {
            return Err(config_error("policy service URL is required"));
        }
        if self.poll_min.is_zero() || self.poll_max.is_zero() {
            return Err(config_error("revalidation intervals must be greater than zero"));
        }
        if self.poll_min > self.poll_max {
            return Err(config_error(format!(
                "minimum revalidation interval ({:?}) exceeds maximum ({:?})",
                self.poll_min, self.poll_max
            )));
        }
        if self.http_timeout.is_zero() {
            return Err(config_error("HTTP timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Persistence directory, falling back to the default temp location.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(".opa").join("policies"))
    }

    /// Set the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the resource prefix.
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = Some(prefix.into());
        self
    }

    /// Set the bearer credential.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Enable or disable persistence.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Set the persistence directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set both revalidation bounds.
    pub fn with_poll_interval(mut self, min: Duration, max: Duration) -> Self {
        self.poll_min = min;
        self.poll_max = max;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

fn config_error(message: impl Into<String>) -> LoadError {
    LoadError::Config {
        message: message.into(),
    }
}

pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, raw: &str) -> LoadResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(config_error(format!("invalid {}: {:?}", name, raw))),
    }
}

fn duration_from_env(name: &str, default: Duration) -> LoadResult<Duration> {
    let Some(raw) = env_non_empty(name) else {
        return Ok(default);
    };
    let secs: i64 = raw
        .parse()
        .map_err(|e| config_error(format!("invalid {}: {}", name, e)))?;
    if secs <= 0 {
        return Err(config_error(format!("{} must be greater than zero", name)));
    }
    Ok(Duration::from_secs(secs as u64))
}
