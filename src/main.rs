use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use skiff::protocol::DEFAULT_PORT;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Skiff - list, upload, and download files on a skiffd server"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to a server and run the interactive prompt
    Connect {
        /// Server hostname or address
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Operate on a serve directory directly, without a network
    Local {
        /// Serve directory (created if missing)
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    match Args::parse().command {
        Command::Connect { host, port } => skiff::client::run(&host, port),
        Command::Local { dir } => skiff::local::run(&dir),
    }
}
