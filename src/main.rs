pub(crate) mod ai;
mod cli;
mod config;
pub(crate) mod controller;
mod error;
mod interactive;
mod logging;
mod server;

pub(crate) use error::{AppError, AppResult};

use std::process::exit;

use clap::Parser;
use tracing::{debug, error};

use crate::cli::{Cli, GetVerbosity};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::setup_logger(cli.cmd.get_verbosity(), cli.color);

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => error!("Ignoring unreadable .env file: {e}"),
    }

    if let Err(e) = cli.cmd.run().await {
        error!("{} ({})", e, e.kind().as_str());
        exit(1);
    }
}
