//! Nanostore CLI
//!
//! Command-line interface over a file-backed compressed store:
//! - Set, get and remove values
//! - Inspect keys and compression stats
//! - Encode/decode framed records directly

use anyhow::Context;
use clap::{Parser, Subcommand};
use nanostore::config::{generate_default_config, Config, LoggingConfig};
use nanostore::storage::{Algorithm, Codec, CompressedStore, FileStore};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "nanostore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compressed key-value storage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store file, overrides the configured path
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Compression threshold in bytes
    #[arg(long, global = true)]
    pub threshold: Option<usize>,

    /// Compression algorithm (gzip, deflate)
    #[arg(long, global = true)]
    pub algorithm: Option<Algorithm>,

    /// Key prefix
    #[arg(long, global = true)]
    pub prefix: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a JSON value
    Set {
        key: String,
        /// JSON text (a bare word is stored as a string)
        value: String,
    },

    /// Print a stored value as JSON
    Get { key: String },

    /// Remove a value
    Remove { key: String },

    /// Check whether a key exists
    Has { key: String },

    /// List managed keys
    Keys,

    /// Show compression statistics
    Stats,

    /// Remove all managed keys
    Clear,

    /// Print the framed record for a JSON value without storing it
    Encode { value: String },

    /// Decode a framed record and print its JSON
    Decode { record: String },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_with_env(path)?,
            None => Config::load_default()?,
        };

        if let Some(file) = &self.file {
            config.store.path = file.to_string_lossy().to_string();
        }
        if let Some(threshold) = self.threshold {
            config.store.threshold = threshold;
        }
        if let Some(algorithm) = self.algorithm {
            config.store.algorithm = algorithm;
        }
        if let Some(prefix) = &self.prefix {
            config.store.key_prefix = prefix.clone();
        }

        Ok(config)
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("nanostore={}", logging.level)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(&config.logging);

    let options = config.store.options();

    match &cli.command {
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(path, content)
                        .with_context(|| format!("writing {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
            return Ok(());
        }
        Commands::Encode { value } => {
            let result = Codec::new().compress(&parse_value(value), &options.clone().resolve())?;
            println!("{}", result.data);
            eprintln!(
                "{} → {} bytes (compressed: {})",
                result.original_size, result.compressed_size, result.was_compressed
            );
            return Ok(());
        }
        Commands::Decode { record } => {
            let value: Value = Codec::new().decompress(record.trim())?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        _ => {}
    }

    let backend = FileStore::open_with_quota(&config.store.path, config.store.quota)
        .with_context(|| format!("opening store {}", config.store.path))?;
    let store = CompressedStore::new(backend, options);

    match cli.command {
        Commands::Set { key, value } => {
            let result = store.set_item(&key, &parse_value(&value)).await?;
            println!(
                "Stored {}: {} → {} bytes{}",
                key,
                result.original_size,
                result.compressed_size,
                if result.was_compressed { " (compressed)" } else { "" }
            );
        }
        Commands::Get { key } => match store.get_item::<Value>(&key).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => {
                eprintln!("Key not found: {}", key);
                std::process::exit(1);
            }
        },
        Commands::Remove { key } => {
            store.remove_item(&key).await?;
            println!("Removed {}", key);
        }
        Commands::Has { key } => {
            let exists = store.has_item(&key).await?;
            println!("{}", exists);
            if !exists {
                std::process::exit(1);
            }
        }
        Commands::Keys => {
            for key in store.keys().await? {
                println!("{}", key);
            }
        }
        Commands::Stats => {
            let stats = store.get_stats().await?;
            println!("Items:             {}", stats.total_items);
            println!("Original size:     {} bytes", stats.original_size);
            println!("Stored size:       {} bytes", stats.compressed_size);
            println!("Compression ratio: {:.3}", stats.compression_ratio);
            println!("Saved:             {} bytes", stats.saved_bytes());
        }
        Commands::Clear => {
            let count = store.length().await?;
            store.clear().await?;
            println!("Removed {} keys", count);
        }
        Commands::Config { .. } | Commands::Encode { .. } | Commands::Decode { .. } => {}
    }

    Ok(())
}
