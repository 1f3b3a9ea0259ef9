use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use regolet_loader::{
    CommandEvaluator, InvocationRequest, InvocationResponse, LoadError, PolicyRunner,
};
use tokio::io::AsyncReadExt;

use crate::cli::args::EvalArgs;
use crate::exit_codes::{EVAL_FAILED, SUCCESS};

pub async fn run(args: EvalArgs) -> anyhow::Result<i32> {
    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .context("unable to read payload from stdin")?;

    let payload: serde_json::Value =
        serde_json::from_slice(&input).context("payload on stdin is not valid JSON")?;

    let runner = PolicyRunner::new(
        regolet_loader::backend::from_env()?,
        Arc::new(CommandEvaluator::parse(&args.engine)?),
    );
    let request = InvocationRequest {
        policy: args.policy.clone(),
        payload: Some(payload),
    };

    let response = match tokio::time::timeout(
        Duration::from_secs(args.timeout_secs),
        runner.handle(&request),
    )
    .await
    {
        Ok(response) => response,
        Err(_) => InvocationResponse {
            output: None,
            error: Some(
                LoadError::Cancelled {
                    name: args.policy.clone(),
                }
                .to_string(),
            ),
        },
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(if response.error.is_some() {
        EVAL_FAILED
    } else {
        SUCCESS
    })
}
