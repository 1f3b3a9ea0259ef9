//! Filesystem policy loader: a direct read of `{root}/policies/...rego`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::key::to_relative_path;
use crate::loader::PolicyLoader;

#[derive(Debug, Clone)]
pub struct FsPolicyLoader {
    root: PathBuf,
}

impl FsPolicyLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl PolicyLoader for FsPolicyLoader {
    async fn load(&self, policy_name: &str) -> LoadResult<String> {
        let path = self.root.join(to_relative_path(policy_name)?);
        debug!(policy = %policy_name, path = %path.display(), "reading policy");

        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound {
                name: policy_name.to_string(),
            },
            ErrorKind::PermissionDenied => LoadError::Unauthorized {
                message: format!("cannot read {}: {}", path.display(), e),
            },
            _ => LoadError::Unreachable {
                message: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        String::from_utf8(bytes).map_err(|e| LoadError::Corrupt {
            message: format!("policy {} is not valid UTF-8: {}", policy_name, e),
        })
    }
}
