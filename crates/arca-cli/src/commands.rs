use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use arca_server::{ArcaServer, ServerConfig};
use arca_store::FileSystemBlobStore;
use arca_tree::{DirectoryTree, EntryFlags, TreeListing, TreeStore};
use arca_types::{BlobId, NamespaceId};
use bytes::Bytes;
use colored::Colorize;
use serde_json::json;
use walkdir::WalkDir;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Config(args) => cmd_config(args),
        Command::Hash(args) => cmd_hash(args, cli.format).await,
        Command::Tree(TreeArgs { action }) => match action {
            TreeAction::Snapshot { dir, store } => cmd_snapshot(&dir, store, cli.format).await,
            TreeAction::Ls { hash, store } => cmd_ls(&hash, store, cli.format).await,
        },
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {bind}"))?;
    }
    println!("{} Arca server on {}", "→".cyan(), config.bind_addr.to_string().bold());
    ArcaServer::new(config)?.serve().await?;
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

async fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let blob = arca_crypto::blob_id(&data);
    let content = arca_crypto::content_id(&data);
    match format {
        OutputFormat::Text => {
            println!("blob     {}", blob.to_hex().yellow());
            println!("content  {}", content.to_hex().yellow());
        }
        OutputFormat::Json => println!(
            "{}",
            json!({ "file": args.file, "blob": blob, "content_id": content, "size": data.len() })
        ),
    }
    Ok(())
}

fn open_tree_store(args: &TreeStoreArgs) -> anyhow::Result<TreeStore> {
    let namespace = NamespaceId::new(args.namespace.as_str())?;
    Ok(TreeStore::new(
        Arc::new(FileSystemBlobStore::new(args.root.clone())),
        namespace,
    ))
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_: &std::fs::Metadata) -> bool {
    false
}

/// Store every file and directory below `dir`. Symlinks are skipped.
/// Returns the root hash and the number of files stored.
pub async fn snapshot(dir: &Path, store: TreeStore) -> anyhow::Result<(BlobId, usize)> {
    let mut tree = DirectoryTree::new(store);
    let mut files = 0;

    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let relative = entry.path().strip_prefix(dir)?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_type = entry.file_type();
        if file_type.is_dir() {
            tree.insert_directory(&path).await?;
        } else if file_type.is_file() {
            let metadata = entry.metadata()?;
            let mut flags = EntryFlags::empty();
            if is_executable(&metadata) {
                flags = flags | EntryFlags::EXECUTABLE;
            }
            if metadata.permissions().readonly() {
                flags = flags | EntryFlags::READ_ONLY;
            }
            let data = tokio::fs::read(entry.path())
                .await
                .with_context(|| format!("reading {}", entry.path().display()))?;
            tree.insert_file(&path, Bytes::from(data), flags).await?;
            files += 1;
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular file");
        }
    }

    Ok((tree.commit().await?, files))
}

async fn cmd_snapshot(dir: &Path, store: TreeStoreArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (root, files) = snapshot(dir, open_tree_store(&store)?).await?;
    match format {
        OutputFormat::Text => println!(
            "{} Stored {} files from {}\n  root: {}",
            "✓".green().bold(),
            files,
            dir.display(),
            root.to_hex().yellow()
        ),
        OutputFormat::Json => println!("{}", json!({ "root": root, "files": files })),
    }
    Ok(())
}

pub async fn list(hash: &str, store: TreeStore) -> anyhow::Result<Vec<TreeListing>> {
    let root = BlobId::from_hex(hash).with_context(|| format!("invalid tree hash {hash}"))?;
    let tree = DirectoryTree::open(store, &root).await?;
    Ok(tree.list().await?)
}

async fn cmd_ls(hash: &str, store: TreeStoreArgs, format: OutputFormat) -> anyhow::Result<()> {
    let listing = list(hash, open_tree_store(&store)?).await?;
    for item in &listing {
        let hash = item.hash.map(|h| h.to_hex()).unwrap_or_default();
        match format {
            OutputFormat::Text => {
                let path = if item.flags.is_directory() {
                    format!("{}/", item.path).blue().bold().to_string()
                } else {
                    item.path.clone()
                };
                println!("{}  {:<24}  {}", hash.dimmed(), item.flags.to_string(), path);
            }
            OutputFormat::Json => println!(
                "{}",
                json!({ "path": item.path, "flags": item.flags.bits(), "hash": hash })
            ),
        }
    }
    Ok(())
}
