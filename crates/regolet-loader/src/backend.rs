//! Backend selection from the process environment.
//!
//! Checked in order:
//! 1. `POLICY_SERVICE_URL` - HTTP policy service
//! 2. `POLICY_BUCKET` - S3 bucket (`POLICY_BUCKET_PREFIX`, `AWS_REGION`)
//! 3. Falls back to the filesystem under `POLICY_DIR` (default: `.`)

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::{env_non_empty, ServiceConfig};
use crate::error::LoadResult;
use crate::fs::FsPolicyLoader;
use crate::loader::PolicyLoader;
use crate::service::PolicyServiceLoader;
use crate::store::ObjectStorePolicyLoader;

/// Which backend [`from_env`] would pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Service(ServiceConfig),
    Bucket {
        bucket: String,
        prefix: String,
        region: Option<String>,
    },
    Filesystem(String),
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(config) => write!(f, "service:{}", config.url),
            Self::Bucket { bucket, prefix, .. } if prefix.is_empty() => {
                write!(f, "s3://{}", bucket)
            }
            Self::Bucket { bucket, prefix, .. } => write!(f, "s3://{}/{}", bucket, prefix),
            Self::Filesystem(root) => write!(f, "file:{}", root),
        }
    }
}

impl BackendKind {
    pub fn from_env() -> LoadResult<Self> {
        if let Some(config) = ServiceConfig::from_env()? {
            return Ok(Self::Service(config));
        }

        if let Some(bucket) = env_non_empty("POLICY_BUCKET") {
            return Ok(Self::Bucket {
                bucket,
                prefix: env_non_empty("POLICY_BUCKET_PREFIX").unwrap_or_default(),
                region: env_non_empty("AWS_REGION"),
            });
        }

        Ok(Self::Filesystem(
            env_non_empty("POLICY_DIR").unwrap_or_else(|| ".".to_string()),
        ))
    }

    /// Construct the loader. Called once per process; the result is meant to
    /// be shared by every invocation.
    pub fn build(self) -> LoadResult<Arc<dyn PolicyLoader>> {
        info!(backend = %self, "initializing policy loader");
        Ok(match self {
            Self::Service(config) => Arc::new(PolicyServiceLoader::new(config)?),
            Self::Bucket {
                bucket,
                prefix,
                region,
            } => Arc::new(ObjectStorePolicyLoader::s3(
                &bucket,
                &prefix,
                region.as_deref(),
            )?),
            Self::Filesystem(root) => Arc::new(FsPolicyLoader::new(root)),
        })
    }
}

/// Pick and build the loader described by the environment.
pub fn from_env() -> LoadResult<Arc<dyn PolicyLoader>> {
    BackendKind::from_env()?.build()
}
