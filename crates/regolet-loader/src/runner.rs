//! Glue between a policy loader and an external evaluation engine.
//!
//! The engine is opaque: it receives the module text and the payload and
//! returns a decision value.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::error::LoadError;
use crate::loader::PolicyLoader;

/// Evaluates a loaded policy module against a payload.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, policy_name: &str, module: &str, payload: &Value)
        -> anyhow::Result<Value>;
}

/// A direct invocation: `{"policy": "auth.user", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// The name of the policy to check.
    #[serde(default)]
    pub policy: String,

    /// The payload to evaluate the policy against.
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Reply to an invocation; exactly one of the fields is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Errors surfaced by [`PolicyRunner::evaluate`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("policy is required")]
    MissingPolicy,

    #[error("payload is required")]
    MissingPayload,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("evaluation of {policy} failed: {source:#}")]
    Evaluation {
        policy: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Loads a policy and hands it to the evaluator. Never retries.
#[derive(Clone)]
pub struct PolicyRunner {
    loader: Arc<dyn PolicyLoader>,
    evaluator: Arc<dyn Evaluator>,
}

impl PolicyRunner {
    pub fn new(loader: Arc<dyn PolicyLoader>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self { loader, evaluator }
    }

    pub fn loader(&self) -> &Arc<dyn PolicyLoader> {
        &self.loader
    }

    pub async fn evaluate(&self, request: &InvocationRequest) -> Result<Value, RunError> {
        if request.policy.is_empty() {
            return Err(RunError::MissingPolicy);
        }
        let payload = request.payload.as_ref().ok_or(RunError::MissingPayload)?;

        info!(policy = %request.policy, "evaluating policy");

        let module = self.loader.load(&request.policy).await?;
        self.evaluator
            .evaluate(&request.policy, &module, payload)
            .await
            .map_err(|source| RunError::Evaluation {
                policy: request.policy.clone(),
                source,
            })
    }

    /// Evaluate and fold the outcome into a response body.
    pub async fn handle(&self, request: &InvocationRequest) -> InvocationResponse {
        match self.evaluate(request).await {
            Ok(output) => InvocationResponse {
                output: Some(output),
                error: None,
            },
            Err(e) => {
                error!(policy = %request.policy, error = %e, "policy evaluation failed");
                InvocationResponse {
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
