use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use skiff::cli::DaemonOpts;
use skiff::logger::{Logger, NoopLogger, TextLogger};

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    std::fs::create_dir_all(&opts.root)
        .with_context(|| format!("Failed to create root directory: {}", opts.root.display()))?;
    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("Failed to canonicalize root path: {}", opts.root.display()))?;

    println!("Starting skiff daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);

    if opts.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: binding to 0.0.0.0 exposes the daemon to all interfaces.");
        eprintln!("This protocol is unauthenticated; only use on trusted networks.");
    }

    let logger: Arc<dyn Logger> = match opts.log {
        Some(path) => Arc::new(
            TextLogger::new(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?,
        ),
        None => Arc::new(NoopLogger),
    };

    skiff::server::serve(&opts.bind, &canonical_root, logger)
}
