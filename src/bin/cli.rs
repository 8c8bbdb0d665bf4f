// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! CLI supporting `create-bucket`, `delete-bucket`, `get` and `upload`.
//!
//! Examples:
//! ```bash
//! s3bulk create-bucket my-bucket
//! s3bulk get    my-bucket a.npz b.npz c.npz --out ./data   # bulk download
//! s3bulk upload my-bucket files/*.txt -j 32                # bulk upload
//! s3bulk --backend file:///srv/store get my-bucket a.npz    # local filesystem store
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s3bulk::{
    infer_scheme, ClientOptions, FileSystemGateway, Scheme, StorageClient, StorageClientConfig,
    UploadItem,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// Storage backend: `s3` (endpoint and keys from env / .env) or `file:///root/dir`.
    #[arg(long, default_value = "s3")]
    backend: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new bucket.
    CreateBucket {
        bucket: String,
    },

    /// Delete a bucket. The bucket must be empty.
    DeleteBucket {
        bucket: String,
    },

    /// Download many objects concurrently; nothing is written unless every download succeeds.
    Get {
        bucket: String,

        /// Object names to fetch.
        #[arg(required = true)]
        names: Vec<String>,

        /// Directory to write objects into.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Maximum concurrent transfers (default: one per object).
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,
    },

    /// Upload local files concurrently; object name = file name.
    Upload {
        bucket: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum concurrent transfers (default: one per file).
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,
    },
}

async fn build_client(backend: &str, jobs: Option<usize>) -> Result<StorageClient> {
    let client = match (backend, infer_scheme(backend)) {
        ("s3", _) | (_, Scheme::S3) => {
            let endpoint = (backend != "s3").then_some(backend);
            StorageClient::connect(StorageClientConfig::from_env_with_endpoint(endpoint)?).await?
        }
        (_, Scheme::File) => StorageClient::with_gateway(Arc::new(FileSystemGateway::from_uri(backend)?)),
        (_, Scheme::Unknown) => {
            bail!("Unable to infer backend from: {backend}. Supported: s3, http(s)://endpoint, file://")
        }
    };

    let mut options = ClientOptions::from_env()?;
    if jobs.is_some() {
        options.max_in_flight = jobs;
    }
    Ok(client.with_options(options)?)
}

// Object names become paths under --out; they may not climb out of it.
fn output_path(out: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    if name.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        bail!("object name '{}' cannot be written under {}", name, out.display());
    }
    Ok(out.join(rel))
}

async fn write_objects(out: &Path, objects: s3bulk::BulkResult) -> Result<u64> {
    let mut total = 0u64;
    for (name, data) in objects {
        let path = output_path(out, &name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        total += data.len() as u64;
    }
    Ok(total)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Capture log crate messages from the AWS SDK dependencies
    tracing_log::LogTracer::init().ok();

    match cli.cmd {
        Command::CreateBucket { bucket } => {
            let client = build_client(&cli.backend, None).await?;
            info!("Attempting to create bucket: {}...", bucket);
            client.create_bucket(&bucket).await?;
            println!("Created bucket '{}'.", bucket);
        }

        Command::DeleteBucket { bucket } => {
            let client = build_client(&cli.backend, None).await?;
            info!("Attempting to delete bucket: {}...", bucket);
            client.delete_bucket(&bucket).await?;
            println!("Deleted bucket '{}'.", bucket);
        }

        Command::Get { bucket, names, out, jobs } => {
            for name in &names {
                output_path(&out, name)?;
            }
            let client = build_client(&cli.backend, jobs).await?;
            let count = names.len();
            let objects = client.bulk_download(&bucket, names).await?;
            let bytes = write_objects(&out, objects).await?;
            println!("Downloaded {} objects ({} bytes) to {}", count, bytes, out.display());
        }

        Command::Upload { bucket, files, jobs } => {
            let client = build_client(&cli.backend, jobs).await?;
            let mut items = Vec::with_capacity(files.len());
            for path in &files {
                items.push(UploadItem::from_path(path).await?);
            }
            let count = items.len();
            client.bulk_upload(&bucket, items).await?;
            println!("Uploaded {} files to '{}'", count, bucket);
        }
    }

    Ok(())
}
