//! verfs CLI
//!
//! Inspect and extend a versioned object directory through the mediation layer.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use verfs::{StorageProvider, VerfsConfig, VersionedFs};

#[derive(Parser)]
#[command(name = "verfs")]
#[command(about = "Versioned, append-only file store")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Object directory (overrides config)
    #[arg(short, long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List logical files
    Ls,

    /// Print the latest (or a specific) version of a file
    Cat {
        name: String,
        /// Version number to read instead of the latest
        #[arg(short, long)]
        version: Option<u32>,
    },

    /// Write data into a new version of a file
    Write {
        name: String,
        data: String,
        /// Byte offset to write at
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
    },

    /// Show every version of a file with its checksum
    History {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attempt to remove a file (always refused)
    Rm { name: String },

    /// Show the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let mut cfg = match VerfsConfig::load_from(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(root) = &cli.root {
        cfg.storage.root = root.clone();
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, &cfg) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn open_fs(cfg: &VerfsConfig) -> anyhow::Result<VersionedFs<Box<dyn StorageProvider>>> {
    let storage = cfg
        .build_storage()
        .with_context(|| format!("opening storage at {:?}", cfg.storage_root()))?;
    Ok(VersionedFs::recover(storage)?)
}

fn run(command: Commands, cfg: &VerfsConfig) -> anyhow::Result<()> {
    match command {
        Commands::Ls => {
            let fs = open_fs(cfg)?;
            for name in fs.list_files() {
                println!("{}", name);
            }
        }

        Commands::Cat { name, version } => {
            let fs = open_fs(cfg)?;
            let handle = match version {
                Some(v) => fs.open_version(&name, v)?,
                None => fs.open(&name, false)?,
            };
            let content = fs.read(&handle, 0, None);
            fs.close(handle)?;
            print!("{}", String::from_utf8_lossy(&content?));
        }

        Commands::Write { name, data, offset } => {
            let fs = open_fs(cfg)?;
            let handle = fs.open(&name, true)?;
            let version = handle.version();
            let written = fs.write(&handle, offset, data.as_bytes());
            fs.close(handle)?;
            written?;
            println!("{} version {}", name, version);
        }

        Commands::History { name, json } => {
            let fs = open_fs(cfg)?;
            let history = fs.history(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for info in &history {
                    let created = info
                        .created_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{}  {}", info, created);
                }
            }
        }

        Commands::Rm { name } => {
            let fs = open_fs(cfg)?;
            fs.delete(&name)?;
        }

        Commands::Config => {
            print!("{}", cfg.to_toml()?);
        }
    }

    Ok(())
}
