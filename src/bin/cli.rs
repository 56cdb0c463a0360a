//! CaskDB CLI
//!
//! Command-line interface for a CaskDB data directory.

use caskdb::{CaskError, Config, Engine, IteratorOptions};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskDB CLI
#[derive(Parser, Debug)]
#[command(name = "caskdb-cli")]
#[command(about = "CLI for the CaskDB key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./caskdb_data")]
    dir: String,

    /// Data file size limit in MB before rotation
    #[arg(short = 'f', long, default_value = "256")]
    file_size_mb: u64,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys and values in order
    Scan {
        /// Only keys starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Descending order
        #[arg(short, long)]
        reverse: bool,
    },

    /// Show engine statistics
    Stat,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caskdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("CaskDB CLI v{}", caskdb::VERSION);

    let config = Config::builder()
        .dir_path(&args.dir)
        .data_file_size(args.file_size_mb * 1024 * 1024)
        .sync_writes(args.sync)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        std::process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> caskdb::Result<()> {
    match command {
        Commands::Get { key } => match engine.get(key.as_bytes()) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(CaskError::KeyNotFound) => println!("(nil)"),
            Err(e) => return Err(e),
        },
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { prefix, reverse } => {
            let mut iter = engine.iter(IteratorOptions {
                prefix: prefix.into_bytes(),
                reverse,
            });
            for entry in iter.entries() {
                let (key, value) = entry?;
                println!(
                    "{} => {}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
            iter.close();
        }
        Commands::Stat => {
            let stats = engine.stat()?;
            println!("keys:       {}", stats.key_count);
            println!("data files: {}", stats.data_file_count);
            println!("disk size:  {} bytes", stats.disk_size);
        }
    }
    Ok(())
}
