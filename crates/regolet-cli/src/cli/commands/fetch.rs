use std::time::Duration;

use regolet_loader::PolicyLoader;
use tracing::error;

use crate::cli::args::FetchArgs;
use crate::exit_codes::SUCCESS;

pub async fn run(args: FetchArgs) -> anyhow::Result<i32> {
    let loader = regolet_loader::backend::from_env()?;

    match loader
        .load_within(&args.policy, Duration::from_secs(args.timeout_secs))
        .await
    {
        Ok(module) => {
            print!("{}", module);
            if !module.ends_with('\n') {
                println!();
            }
            Ok(SUCCESS)
        }
        Err(e) => {
            error!(policy = %args.policy, error = %e, "failed to load policy");
            eprintln!("error: {}", e);
            Ok(e.exit_code())
        }
    }
}
