//! Policy module loading with a revalidating cache.
//!
//! This crate fetches named Rego policy modules from one of several
//! interchangeable backends:
//!
//! - HTTP policy service with ETag revalidation, jittered polling and an
//!   on-disk fallback ([`PolicyServiceLoader`])
//! - Object storage such as S3 ([`ObjectStorePolicyLoader`])
//! - Local filesystem ([`FsPolicyLoader`])
//!
//! Every backend implements [`PolicyLoader`]. A loader is built once per
//! process and shared by all invocations.
//!
//! # Quick Start
//!
//! ```no_run
//! use regolet_loader::{PolicyLoader, PolicyServiceLoader, ServiceConfig};
//!
//! # async fn example() -> regolet_loader::LoadResult<()> {
//! let loader = PolicyServiceLoader::new(
//!     ServiceConfig::new("https://policies.example.com").with_bearer_token("secret"),
//! )?;
//!
//! // Fetches policies/auth/user.rego; served from memory until revalidation.
//! let module = loader.load("auth.user").await?;
//! println!("{}", module);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `POLICY_SERVICE_URL` | Policy service base URL (enables the HTTP backend) |
//! | `POLICY_RESOURCE_PREFIX` | Path segment inserted before the policy path |
//! | `POLICY_BEARER_TOKEN` | Bearer credential |
//! | `POLICY_PERSIST` | On-disk fallback cache (default: true) |
//! | `POLICY_CACHE_DIR` | Fallback cache directory (default: `$TMPDIR/.opa/policies`) |
//! | `POLICY_POLL_MIN_SECONDS` | Minimum revalidation interval (default: 10) |
//! | `POLICY_POLL_MAX_SECONDS` | Maximum revalidation interval (default: 30) |
//! | `POLICY_HTTP_TIMEOUT_SECONDS` | Request timeout (default: 15) |
//! | `POLICY_BUCKET` | S3 bucket (object-storage backend) |
//! | `POLICY_BUCKET_PREFIX` | Key prefix inside the bucket |
//! | `POLICY_DIR` | Filesystem backend root (default: `.`) |

pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod key;
pub mod loader;
pub mod runner;
pub mod service;
pub mod store;

// Re-export main types
pub use backend::BackendKind;
pub use command::CommandEvaluator;
pub use config::ServiceConfig;
pub use error::{LoadError, LoadResult};
pub use fs::FsPolicyLoader;
pub use key::{to_path, to_relative_path};
pub use loader::PolicyLoader;
pub use runner::{Evaluator, InvocationRequest, InvocationResponse, PolicyRunner, RunError};
pub use service::PolicyServiceLoader;
pub use store::ObjectStorePolicyLoader;
