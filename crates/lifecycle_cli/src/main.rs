//! Command-line entry point for the lifecycle core.
//!
//! # Responsibility
//! - Load the lifecycle config and start the file log sink.
//! - Given a database path, open it (applying migrations) and check the
//!   deletion registry against the live schema.

use clap::Parser;
use lifecycle_core::LifecycleConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "lifecycle", about = "Account lifecycle maintenance", version)]
struct Cli {
    /// SQLite database to migrate and verify.
    db: Option<PathBuf>,

    /// JSON lifecycle config; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for rolling log files; logging stays off when omitted.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("lifecycle_core version={}", lifecycle_core::core_version());

    let config = match &cli.config {
        Some(path) => match LifecycleConfig::from_json_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => LifecycleConfig::default(),
    };

    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = lifecycle_core::init_logging_from_config(&config, log_dir) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
        if let Some((level, dir)) = lifecycle_core::active_logging() {
            println!("logging level={level} dir={}", dir.display());
        }
    }

    let Some(db_path) = cli.db else {
        return ExitCode::SUCCESS;
    };

    let conn = match lifecycle_core::open_db(&db_path) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("open {} failed: {err}", db_path.display());
            return ExitCode::FAILURE;
        }
    };

    match lifecycle_core::verify_registry(&conn) {
        Ok(()) => {
            println!("registry=ok db={}", db_path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("registry=mismatch db={}: {err}", db_path.display());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn flags_are_optional_and_db_is_positional() {
        let bare = Cli::try_parse_from(["lifecycle"]).unwrap();
        assert!(bare.db.is_none() && bare.config.is_none() && bare.log_dir.is_none());

        let full = Cli::try_parse_from([
            "lifecycle",
            "--config",
            "lifecycle.json",
            "--log-dir",
            "logs",
            "pod.sqlite3",
        ])
        .unwrap();
        assert_eq!(full.db, Some(PathBuf::from("pod.sqlite3")));
        assert_eq!(full.config, Some(PathBuf::from("lifecycle.json")));
        assert_eq!(full.log_dir, Some(PathBuf::from("logs")));
    }
}
