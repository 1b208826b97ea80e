//! typedkv Inspect Binary
//!
//! Offline inspection of a `LogEngine` data directory.
//!
//! Only built-in tags can be decoded here; rows written with user tags are
//! listed with their tag and payload size.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use typedkv::{Config, ConverterRegistry, Engine, KeyPredicate, LogEngine, Row};

/// typedkv inspector
#[derive(Parser, Debug)]
#[command(name = "typedkv-inspect")]
#[command(about = "Inspect and maintain a typedkv data directory")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./typedkv_data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the number of rows
    Count,

    /// List keys with their tags
    Keys {
        /// Only keys starting with this prefix
        #[arg(long, conflicts_with = "contains")]
        prefix: Option<String>,

        /// Only keys containing this string
        #[arg(long)]
        contains: Option<String>,

        /// Only rows stored under this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Decode and print one value
    Show {
        /// The key to show
        key: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Remove every row
    Clear,

    /// Rewrite the log with one frame per live row
    Compact,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,typedkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("typedkv-inspect v{}", typedkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let config = Config::builder().data_dir(&args.data_dir).build();
    let engine = match LogEngine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open data directory: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&engine, args.command) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(engine: &LogEngine, command: Commands) -> typedkv::Result<()> {
    let registry = ConverterRegistry::new();

    match command {
        Commands::Count => println!("{}", engine.count()?),
        Commands::Keys {
            prefix,
            contains,
            tag,
        } => {
            let predicate = match (prefix, contains) {
                (Some(prefix), _) => KeyPredicate::Prefix(prefix),
                (None, Some(needle)) => KeyPredicate::Contains(needle),
                (None, None) => KeyPredicate::None,
            };
            for row in engine.scan(&predicate, tag.as_deref())? {
                println!("{}\t{}", row.key, row.tag);
            }
        }
        Commands::Show { key } => match engine.lookup(&key)? {
            Some(row) => println!("{}", describe(&registry, &row)),
            None => println!("(not found)"),
        },
        Commands::Delete { key } => {
            let removed = engine.delete(&key)?;
            engine.sync()?;
            println!("{}", if removed { "deleted" } else { "(not found)" });
        }
        Commands::Clear => println!("removed {} rows", engine.clear()?),
        Commands::Compact => println!("compacted to {} rows", engine.compact()?),
    }

    Ok(())
}

fn describe(registry: &ConverterRegistry, row: &Row) -> String {
    let stored = registry.type_for(&row.tag);
    if stored.is_unknown() {
        return format!("{} = <{}, {} bytes>", row.key, row.tag, row.payload.len());
    }
    match registry.decode(&row.payload, &row.tag) {
        Ok(value) => format!("{} ({}) = {:?}", row.key, stored, value),
        Err(e) => format!("{} ({}) = <undecodable: {}>", row.key, stored, e),
    }
}
