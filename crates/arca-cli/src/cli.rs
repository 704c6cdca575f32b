use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arca", about = "Content-addressed artifact cache", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

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
    /// Run the cache server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
    /// Print the blob and content identifiers of a file
    Hash(HashArgs),
    /// Store or inspect directory trees
    Tree(TreeArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides `bind_addr` from the configuration.
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Validate and print this file instead of the defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct TreeArgs {
    #[command(subcommand)]
    pub action: TreeAction,
}

/// Where tree blobs are kept.
#[derive(Args, Clone)]
pub struct TreeStoreArgs {
    /// Root directory of a filesystem blob store.
    #[arg(long)]
    pub root: PathBuf,
    #[arg(long, default_value = "trees")]
    pub namespace: String,
}

#[derive(Subcommand)]
pub enum TreeAction {
    /// Store a directory and print its root hash
    Snapshot {
        dir: PathBuf,
        #[command(flatten)]
        store: TreeStoreArgs,
    },
    /// List a stored tree
    Ls {
        hash: String,
        #[command(flatten)]
        store: TreeStoreArgs,
    },
}
