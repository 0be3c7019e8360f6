use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docattr",
    about = "Document attribution and version-delta service",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "DOCATTR_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server and compaction workers
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
    /// Show the persisted attributions of a document
    Attributions(DocArgs),
    /// List the stored versions of a document and their deltas
    Versions(DocArgs),
}

#[derive(Args, Default)]
pub struct ServeArgs {
    #[arg(long, env = "DOCATTR_BIND")]
    pub bind: Option<SocketAddr>,
    /// Number of compaction workers
    #[arg(long, env = "DOCATTR_WORKERS")]
    pub workers: Option<usize>,
    /// Root directory of the filesystem store
    #[arg(long, env = "DOCATTR_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct DocArgs {
    pub docid: String,
}
