//! Shared CLI fragments for the skiff and skiffd binaries

use clap::Parser;
use std::path::PathBuf;

/// Daemon options for skiffd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:12345")]
    pub bind: String,

    /// Root directory to serve (created if missing)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Append timestamped session events to this file
    #[arg(long)]
    pub log: Option<PathBuf>,
}
