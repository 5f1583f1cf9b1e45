//! `notekeeper` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments and start the note server.
//! - Map startup failures to a non-zero exit status.

use clap::{Parser, Subcommand};
use log::error;
use notekeeper_core::{
    default_log_level, init_logging, load_config, open_db, share, ConfigError, Server, Services,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "notekeeper", version, about = "Personal note server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the note protocol on the configured address.
    Serve {
        #[arg(long = "config", default_value = "config.json")]
        config: PathBuf,
        /// trace|debug|info|warn|error; defaults by build mode.
        #[arg(long = "log-level")]
        log_level: Option<String>,
        /// Write rolling log files here instead of stderr.
        #[arg(long = "log-dir")]
        log_dir: Option<String>,
    },
    /// Print core linkage and version.
    Ping,
}

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Serve {
            config,
            log_level,
            log_dir,
        } => serve(config, log_level, log_dir),
        Command::Ping => {
            println!("notekeeper_core ping={}", notekeeper_core::ping());
            println!("notekeeper_core version={}", notekeeper_core::core_version());
            ExitCode::SUCCESS
        }
    }
}

fn serve(config_path: PathBuf, log_level: Option<String>, log_dir: Option<String>) -> ExitCode {
    let level = log_level.as_deref().unwrap_or_else(|| default_log_level());
    if let Err(err) = init_logging(level, log_dir.as_deref()) {
        eprintln!("notekeeper: {err}");
        return ExitCode::FAILURE;
    }

    match start(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=server_start module=cli status=error error={err}");
            eprintln!("notekeeper: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let conn = open_db(&config.database).map_err(ConfigError::Database)?;
    let server = Server::bind(&config, Services::sqlite(share(conn)))?;
    server.serve()?;
    Ok(())
}
