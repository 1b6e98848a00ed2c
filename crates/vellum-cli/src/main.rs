//! Vellum CLI: store and inspect files through the configured storage backend.
//!
//! The backend is selected from the environment (or `.env`): set
//! STORAGE_BACKEND=local with LOCAL_STORAGE_PATH, or STORAGE_BACKEND=s3 with
//! the AWS_S3_* variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use vellum_cli::{default_name, init_tracing, FileInfo};
use vellum_core::StorageConfig;
use vellum_storage::{create_storage, StorageFile};

#[derive(Parser)]
#[command(name = "vellum", about = "Vellum storage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file
    Put {
        /// Path to the file to store
        file: PathBuf,
        /// Logical name to store it under (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Copy a stored file to a local path or stdout
    Get {
        /// Stored file name
        name: String,
        /// Destination path (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show name, path and size of a stored file
    Stat {
        /// Stored file name
        name: String,
    },
    /// Print the path or URL of a stored file
    Url {
        /// Stored file name
        name: String,
    },
    /// Delete a stored file
    Rm {
        /// Stored file name
        name: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;

    tracing::debug!(backend = %storage.backend_type(), "Storage backend initialized");

    match cli.command {
        Commands::Put { file, name } => {
            let name = match name {
                Some(name) => name,
                None => default_name(&file)
                    .with_context(|| format!("{} has no file name", file.display()))?,
            };
            let mut input = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;

            let mut stored = StorageFile::new(name, storage);
            stored.write(&mut input).await?;
            print_json(&FileInfo::of(&stored).await?)?;
        }
        Commands::Get { name, output } => {
            let stored = StorageFile::new(name, storage);
            let mut reader = stored.open().await?;
            match output {
                Some(path) => {
                    let mut out = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    tokio::io::copy(&mut reader, &mut out).await?;
                    out.sync_all().await?;
                }
                None => {
                    let mut out = tokio::io::stdout();
                    tokio::io::copy(&mut reader, &mut out).await?;
                }
            }
        }
        Commands::Stat { name } => {
            let stored = StorageFile::new(name, storage);
            print_json(&FileInfo::of(&stored).await?)?;
        }
        Commands::Url { name } => {
            let stored = StorageFile::new(name, storage);
            println!("{}", stored.path().await?);
        }
        Commands::Rm { name } => {
            let stored = StorageFile::new(name, storage);
            stored.delete().await?;
            tracing::info!(name = %stored.name(), "Deleted");
        }
    }

    Ok(())
}
