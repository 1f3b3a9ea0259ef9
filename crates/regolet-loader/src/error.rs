//! Error types for policy loading.

/// Policy loading errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Malformed policy identifier.
    #[error("invalid policy name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Backend confirms the policy does not exist.
    #[error("policy {name} not found")]
    NotFound { name: String },

    /// Credentials rejected or missing.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Transport failure, error status, or nothing to serve.
    #[error("policy backend unreachable: {message}")]
    Unreachable { message: String },

    /// Fetched or persisted content is unreadable.
    #[error("corrupt policy content: {message}")]
    Corrupt { message: String },

    /// Deadline expired before the policy could be produced.
    #[error("loading policy {name} was cancelled")]
    Cancelled { name: String },

    /// Persisted copy could not be read or written.
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl LoadError {
    /// Exit code for CLI. Load failures occupy 10..=17 so they never collide
    /// with the binary's own codes.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidName { .. } => 10,
            Self::Config { .. } => 11,
            Self::NotFound { .. } => 12,
            Self::Unauthorized { .. } => 13,
            Self::Unreachable { .. } => 14,
            Self::Cancelled { .. } => 15,
            Self::Corrupt { .. } => 16,
            Self::Cache { .. } => 17,
        }
    }

    /// Whether a previously cached copy may be served in place of this error.
    pub fn allows_stale(&self) -> bool {
        !matches!(
            self,
            Self::InvalidName { .. } | Self::Cancelled { .. } | Self::Config { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable {
            message: err.to_string(),
        }
    }
}

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;
