use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use depot::bootstrap;
use depot::cli::DaemonOpts;
use depot::logger::{Logger, StderrLogger, TextLogger};

#[cfg(unix)]
fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    bootstrap::setup_directories(&opts.root)?;
    let canonical_root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("Failed to canonicalize root path: {}", opts.root.display()))?;

    println!("Starting depot daemon:");
    println!("  Root: {}", canonical_root.display());
    println!("  Bind: {}", opts.bind);
    if opts.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: binding to 0.0.0.0 exposes the daemon to all interfaces");
        eprintln!("   This protocol is unencrypted - only use on trusted networks (LAN)");
    }

    let logger: Arc<dyn Logger> = match &opts.log_file {
        Some(path) => Arc::new(TextLogger::new(path)?),
        None => Arc::new(StderrLogger),
    };
    let directory = Arc::new(depot::identity::SystemIdentity);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    rt.block_on(depot::server::serve(
        &opts.bind,
        &canonical_root,
        directory,
        logger,
    ))
}

#[cfg(not(unix))]
fn main() -> Result<()> {
    anyhow::bail!("depotd requires a unix host for system identity lookups");
}
