use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Poseidon probabilistic hypocenter locator.
#[derive(Parser)]
#[command(
    name = "poseidon",
    version,
    about = "Probabilistic seismic hypocenter locator"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Locate an event described by a TOML run file.
    Locate(LocateArgs),
}

/// Arguments for the `locate` subcommand.
#[derive(clap::Args)]
pub struct LocateArgs {
    /// Path to TOML run file.
    #[arg(short, long, default_value = "poseidon.toml")]
    pub config: PathBuf,

    /// Path for hypocenter JSON output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path for scatter-cloud JSON output.
    #[arg(long)]
    pub scatter: Option<PathBuf>,

    /// Override random seed from config.
    #[arg(short, long)]
    pub seed: Option<u64>,
}
