use anyhow::Result;
use clap::Parser;
use srclines::{cli, db, import, rpc, util};
use std::path::Path;

fn main() -> Result<()> {
    // stdout carries protocol output; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = cli::Args::parse();
    let db_path = args
        .db
        .unwrap_or_else(|| util::default_db_path(Path::new(".")));

    match args.command {
        cli::Command::Serve => {
            log::info!("Serving {}", db_path.display());
            rpc::serve(&db_path)
        }
        cli::Command::Request {
            method,
            params,
            params_file,
            id,
            user,
        } => {
            let params_raw = if let Some(path) = params_file {
                util::read_to_string(&path)?
            } else {
                params
            };
            let response = rpc::call(&db_path, method, &params_raw, &id, user)?;
            println!("{response}");
            Ok(())
        }
        cli::Command::Import { path } => {
            let dataset = import::load_dataset(&path)?;
            let mut db = db::Db::new(&db_path)?;
            let counts = db.import(&dataset)?;
            log::info!(
                "Imported {} lines across {} files from {}",
                counts.lines,
                counts.files,
                path.display()
            );
            println!("{}", serde_json::to_string_pretty(&counts)?);
            Ok(())
        }
    }
}
