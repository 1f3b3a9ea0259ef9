pub mod args;
pub mod commands;

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::args::{Cli, Command};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["regolet", "fetch", "auth.user", "--timeout-secs", "5"])
            .unwrap();
        match cli.cmd {
            Command::Fetch(args) => {
                assert_eq!(args.policy, "auth.user");
                assert_eq!(args.timeout_secs, 5);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_parse_eval_engine_flag() {
        let cli = Cli::try_parse_from(["regolet", "eval", "auth.user", "--engine", "my-engine -q"])
            .unwrap();
        match cli.cmd {
            Command::Eval(args) => assert_eq!(args.engine, "my-engine -q"),
            _ => panic!("expected eval"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_path() {
        let cli = Cli::try_parse_from(["regolet", "path", "auth.user"]).unwrap();
        assert_eq!(super::commands::dispatch(cli).await.unwrap(), 0);

        let cli = Cli::try_parse_from(["regolet", "path", "auth..user"]).unwrap();
        assert!(super::commands::dispatch(cli).await.is_err());
    }
}
