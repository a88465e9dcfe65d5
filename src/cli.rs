//! Shared CLI fragments for the depot binaries.

use clap::Parser;
use std::path::PathBuf;

/// Daemon options used by depotd.
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Bind address (host:port)
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Base directory for department storage
    #[arg(long, default_value = "/tmp/fileserver")]
    pub root: PathBuf,

    /// Append lifecycle events to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
