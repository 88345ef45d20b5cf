//! OverlayKV CLI
//!
//! Builds and inspects SSTable snapshots, and replays transaction writes
//! through an overlay to show the merged view.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use overlaykv::snapshot::sstable::SSTableBuilder;
use overlaykv::{BufferPool, Config, OverlayStore, Result, SSTableSnapshot};
use tracing_subscriber::{fmt, EnvFilter};

/// OverlayKV CLI
#[derive(Parser, Debug)]
#[command(name = "overlaykv")]
#[command(about = "Inspect snapshots and transactional overlays")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write an SSTable snapshot from key=value pairs
    Build {
        /// Output SSTable file
        path: PathBuf,

        /// Entries as key=value (later duplicates win)
        #[arg(value_parser = parse_pair)]
        entries: Vec<(String, String)>,
    },

    /// Get a value from a snapshot
    Get {
        /// SSTable file
        path: PathBuf,

        /// The key to get
        key: String,
    },

    /// Scan a snapshot, optionally with pending writes layered on top
    Scan {
        /// SSTable file
        path: PathBuf,

        /// First key to include
        #[arg(short, long, default_value = "")]
        start: String,

        /// Pending write as key=value
        #[arg(long = "set", value_parser = parse_pair)]
        sets: Vec<(String, String)>,

        /// Pending delete
        #[arg(long = "delete")]
        deletes: Vec<String>,

        /// Max entries to print
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.to_string(), value.to_string()))
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,overlaykv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let config = Config::default();
    let pool: Arc<BufferPool> = Arc::new(BufferPool::new(&config)?);

    match command {
        Commands::Build { path, entries } => {
            let sorted: BTreeMap<String, String> = entries.into_iter().collect();
            let mut builder = SSTableBuilder::new(&path)?;
            for (key, value) in &sorted {
                builder.add(key.as_bytes(), value.as_bytes())?;
            }
            let table = builder.finish()?;
            println!(
                "wrote {} entries ({} bytes) to {}",
                table.entry_count(),
                table.file_size,
                table.path.display()
            );
        }

        Commands::Get { path, key } => {
            let mut store = OverlayStore::new(SSTableSnapshot::open(&path)?, pool, &config);
            let result = store.get(key.as_bytes());
            store.close();
            match result {
                Ok(value) => println!("{}", value.escape_ascii()),
                Err(e) if e.is_not_found() => println!("(not found)"),
                Err(e) => return Err(e),
            }
        }

        Commands::Scan {
            path,
            start,
            sets,
            deletes,
            limit,
        } => {
            let mut store = OverlayStore::new(SSTableSnapshot::open(&path)?, pool, &config);
            for (key, value) in &sets {
                store.set(key.as_bytes(), value.as_bytes())?;
            }
            for key in &deletes {
                store.delete(key.as_bytes())?;
            }

            for entry in store.seek(start.as_bytes())?.take(limit.unwrap_or(usize::MAX)) {
                let (key, value) = entry?;
                println!("{}\t{}", key.escape_ascii(), value.escape_ascii());
            }

            for pending in store.pending() {
                tracing::debug!(
                    key = %pending.key.escape_ascii(),
                    condition = ?pending.condition,
                    "pending write"
                );
            }
            store.close();
        }
    }

    Ok(())
}
