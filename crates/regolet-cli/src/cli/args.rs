use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "regolet",
    version,
    about = "Load Rego policy modules from a policy service, object storage or disk"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the backend path a policy name maps to
    Path(PathArgs),
    /// Load a policy through the configured backend and print it
    Fetch(FetchArgs),
    /// Evaluate a policy against a JSON payload read from stdin
    Eval(EvalArgs),
    /// Show which backend the environment selects
    Backend,
}

#[derive(Args)]
pub struct PathArgs {
    /// Dotted policy name, e.g. auth.user
    pub policy: String,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Dotted policy name, e.g. auth.user
    pub policy: String,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Args)]
pub struct EvalArgs {
    /// Dotted policy name, e.g. auth.user
    pub policy: String,

    /// Engine command; called as `<engine> <module-file> <policy>` with the payload on stdin
    #[arg(long, env = "REGOLET_ENGINE")]
    pub engine: String,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}
