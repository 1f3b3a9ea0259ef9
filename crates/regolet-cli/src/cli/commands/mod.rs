use super::args::*;

pub mod eval;
pub mod fetch;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Path(args) => {
            println!("{}", regolet_loader::to_path(&args.policy)?);
            Ok(SUCCESS)
        }
        Command::Fetch(args) => fetch::run(args).await,
        Command::Eval(args) => eval::run(args).await,
        Command::Backend => {
            println!("{}", regolet_loader::BackendKind::from_env()?);
            Ok(SUCCESS)
        }
    }
}
