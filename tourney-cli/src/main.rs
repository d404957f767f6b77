mod formats;
mod logger;
mod simulate;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tourney_engine::config::{Config, ConfigError};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// Path to a TOML config file. Environment variables override its values.
    #[clap(short, long)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plays a complete tournament with random results.
    Simulate(simulate::Simulate),
    /// Lists the options accepted by a format.
    Options(formats::Options),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] tourney_engine::Error),
    #[error("failed to write {0}: {1}")]
    Save(PathBuf, std::io::Error),
    #[error("invalid option {0}")]
    InvalidOption(String),
    #[error("simulation panicked")]
    Panicked,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config.with_environment(),
            Err(err) => {
                eprintln!("Failed to load config file {}: {}", path.display(), err);
                process::exit(1);
            }
        },
        None => Config::default().with_environment(),
    };

    if let Err(err) = logger::init(config.loglevel) {
        eprintln!("Failed to install logger: {}", err);
    }

    log::debug!("Using config {:?}", config);

    let res = match args.command {
        Command::Simulate(command) => command.run(config).await,
        Command::Options(command) => command.run(),
    };

    if let Err(err) = res {
        eprintln!("{}", err);
        process::exit(1);
    }
}
