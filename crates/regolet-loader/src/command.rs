//! [`Evaluator`] that shells out to an external engine.
//!
//! The engine is invoked as `<program> <args>... <module-file> <policy-name>`
//! with the payload JSON on stdin, and must print the decision as JSON on
//! stdout.

use std::io::Write;
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::runner::Evaluator;

#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split `engine` (e.g. `"my-engine --strict"`) on whitespace.
    pub fn parse(engine: &str) -> anyhow::Result<Self> {
        let mut parts = engine.split_whitespace().map(String::from);
        let program = parts.next().context("engine command is empty")?;
        Ok(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl Evaluator for CommandEvaluator {
    async fn evaluate(
        &self,
        policy_name: &str,
        module: &str,
        payload: &Value,
    ) -> anyhow::Result<Value> {
        let mut module_file = tempfile::Builder::new()
            .prefix("regolet-")
            .suffix(".rego")
            .tempfile()
            .context("failed to create module file")?;
        module_file
            .write_all(module.as_bytes())
            .context("failed to write module file")?;
        module_file.flush()?;

        debug!(program = %self.program, policy = %policy_name, "running engine");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(module_file.path())
            .arg(policy_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start engine '{}'", self.program))?;

        let input = serde_json::to_vec(payload)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.context("failed to write payload")?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            bail!(
                "engine exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout).context("engine output is not valid JSON")
    }
}
