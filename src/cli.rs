use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "srclines",
    version,
    about = "Serve indexed source lines with SCM and coverage data",
    after_help = r#"Examples:
  srclines import --path dataset.json
  srclines request --method lines --params '{"uuid":"f333aab4-7e3a-4d70-87e1-f4c491f05e5c"}' --user alice
  srclines request --method lines --params '{"uuid":"f333aab4-7e3a-4d70-87e1-f4c491f05e5c","from":10,"to":20}'
  srclines request --method help
  srclines serve
"#
)]
pub struct Args {
    /// SQLite database path (default: ./.srclines/srclines.sqlite).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run JSONL RPC server over stdin/stdout.
    Serve,
    /// Run a single JSONL request and exit.
    Request {
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, value_name = "PATH")]
        params_file: Option<PathBuf>,
        #[arg(long, default_value = "1")]
        id: String,
        /// Login to issue the request as; anonymous when omitted.
        #[arg(long)]
        user: Option<String>,
    },
    /// Load components, grants and source lines from a JSON dataset.
    Import {
        #[arg(long)]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn request_defaults() {
        let args = Args::parse_from(["srclines", "request", "--method", "lines"]);
        assert!(args.db.is_none());
        match args.command {
            Command::Request {
                method,
                params,
                id,
                user,
                params_file,
            } => {
                assert_eq!(method, "lines");
                assert_eq!(params, "{}");
                assert_eq!(id, "1");
                assert!(user.is_none());
                assert!(params_file.is_none());
            }
            _ => panic!("expected request command"),
        }
    }
}
