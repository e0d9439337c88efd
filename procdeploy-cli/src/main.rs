//! procdeploy: change-detecting stored-procedure deployer.
//!
//! # Usage
//!
//! ```text
//! procdeploy [deploy] [--scripts-dir <dir>] [--config <file>] [--quiet]
//! procdeploy records [--config <file>] [--json]
//! ```
//!
//! Database settings are read from `DB_SERVER`, `DB_DATABASE`,
//! `DB_USERNAME`, `DB_PASSWORD` and `DB_PORT`, after loading `.env` from the
//! working directory when one exists.

mod commands;
mod log_rotation;
mod logging;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{deploy::DeployArgs, records::RecordsArgs};

#[derive(Parser, Debug)]
#[command(
    name = "procdeploy",
    version,
    about = "Deploy new and changed stored-procedure scripts to a database",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    deploy: DeployArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy every script whose contents changed since its last deployment (default).
    Deploy(DeployArgs),

    /// List the deployment records stored in the metadata table.
    Records(RecordsArgs),
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Deploy(cli.deploy)) {
        Commands::Deploy(args) => args.run(),
        Commands::Records(args) => args.run(),
    }
}
