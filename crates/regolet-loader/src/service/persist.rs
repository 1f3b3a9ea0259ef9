//! On-disk fallback copies of fetched policies.
//!
//! ```text
//! {cache_dir}/policies/auth/user.rego
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::key::to_relative_path;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Location of the persisted copy for `policy_name` under `cache_dir`.
pub(crate) fn persisted_path(cache_dir: &Path, policy_name: &str) -> LoadResult<PathBuf> {
    Ok(cache_dir.join(to_relative_path(policy_name)?))
}

/// Write `content` next to `path` and rename it into place.
///
/// The temp name is unique per process and call, so concurrent writers never
/// share a temp file and readers only ever see a complete file.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> LoadResult<()> {
    let parent = path.parent().ok_or_else(|| LoadError::Cache {
        message: format!("{} has no parent directory", path.display()),
    })?;

    fs::create_dir_all(parent)
        .await
        .map_err(|e| LoadError::Cache {
            message: format!("failed to create cache directory: {}", e),
        })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut guard = TempGuard::new(temp_path.clone());

    fs::write(&temp_path, content)
        .await
        .map_err(|e| LoadError::Cache {
            message: format!("failed to write temp file: {}", e),
        })?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| LoadError::Cache {
            message: format!("failed to rename temp file: {}", e),
        })?;
    guard.disarm();

    debug!(path = %path.display(), "persisted policy");
    Ok(())
}

/// Removes the temp file on drop unless disarmed, covering both error returns
/// and a future dropped mid-write.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Read a persisted copy. Any I/O failure is returned to the caller.
pub(crate) async fn read_persisted(path: &Path) -> LoadResult<String> {
    let bytes = fs::read(path).await.map_err(|e| LoadError::Cache {
        message: format!("failed to read persisted policy {}: {}", path.display(), e),
    })?;

    String::from_utf8(bytes).map_err(|e| LoadError::Corrupt {
        message: format!("persisted policy {} is not valid UTF-8: {}", path.display(), e),
    })
}
