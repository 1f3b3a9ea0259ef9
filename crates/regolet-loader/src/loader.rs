//! The loader contract shared by every backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LoadError, LoadResult};

/// Produces the module text for a dotted policy name.
///
/// Implementations are shared across concurrent invocations, so they must be
/// safe to call from many tasks at once. Dropping the returned future aborts
/// any in-flight backend call.
#[async_trait]
pub trait PolicyLoader: Send + Sync {
    /// Load the module text for `policy_name`.
    async fn load(&self, policy_name: &str) -> LoadResult<String>;

    /// Load with a deadline; on expiry the backend call is dropped and
    /// [`LoadError::Cancelled`] is returned.
    async fn load_within(&self, policy_name: &str, deadline: Duration) -> LoadResult<String> {
        match tokio::time::timeout(deadline, self.load(policy_name)).await {
            Ok(result) => result,
            Err(_) => Err(LoadError::Cancelled {
                name: policy_name.to_string(),
            }),
        }
    }
}

#[async_trait]
impl<T: PolicyLoader + ?Sized> PolicyLoader for Arc<T> {
    async fn load(&self, policy_name: &str) -> LoadResult<String> {
        (**self).load(policy_name).await
    }
}

#[async_trait]
impl<T: PolicyLoader + ?Sized> PolicyLoader for Box<T> {
    async fn load(&self, policy_name: &str) -> LoadResult<String> {
        (**self).load(policy_name).await
    }
}
