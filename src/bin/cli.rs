//! Tarantool CLI Client
//!
//! Command-line interface over the pooled connector.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tarantool_connector::{Config, Connector, KvStore, PoolStrategy, Tuple};
use tracing_subscriber::{fmt, EnvFilter};

/// Tarantool CLI
#[derive(Parser, Debug)]
#[command(name = "tnt-cli")]
#[command(about = "CLI for a Tarantool server over the binary protocol")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "33013")]
    port: i64,

    /// Space (namespace) number
    #[arg(short, long, default_value = "0")]
    space: u32,

    /// Pool strategy: fixed or elastic
    #[arg(long, default_value = "fixed")]
    strategy: PoolStrategy,

    /// Pool size (fixed) or upper bound (elastic)
    #[arg(long, default_value = "2")]
    pool_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Insert a value under a key
    Insert {
        /// The key
        key: String,

        /// The value
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List all keys
    Keys {
        /// Ask this stored procedure for the keys instead of scanning
        #[arg(long)]
        script: Option<String>,

        /// Most keys the procedure should deliver
        #[arg(long, default_value_t = 1000)]
        batch_size: u32,
    },

    /// Delete all keys
    Truncate,

    /// Call a stored procedure
    Call {
        /// Procedure name
        procedure: String,

        /// Arguments, one field each
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tarantool_connector=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> tarantool_connector::Result<()> {
    let config = Config::builder()
        .host(&args.host)
        .port_number(args.port)
        .strategy(args.strategy)
        .min_pool_size(1)
        .max_pool_size(args.pool_size)
        .build()?;

    tracing::debug!("Connecting to {}", config.address());
    let store = KvStore::new(Connector::connect(config)?, args.space);

    match args.command {
        Commands::Ping => {
            store.connector().ping()?;
            println!("PONG");
        }
        Commands::Insert { key, value } => {
            store.insert(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Delete { key } => {
            let deleted = store.delete(key.as_bytes())?;
            println!("{}", if deleted { 1 } else { 0 });
        }
        Commands::Keys { script, batch_size } => {
            let keys = match script {
                Some(procedure) => store.keys_by_script(&procedure, batch_size)?,
                None => store.keys()?,
            };
            for key in keys {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Truncate => {
            println!("{}", store.truncate()?);
        }
        Commands::Call { procedure, args } => {
            let tuple = args.into_iter().fold(Tuple::new(), |t, arg| t.field(arg));
            for tuple in store.call(&procedure, tuple)? {
                let fields: Vec<String> = tuple
                    .fields()
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect();
                println!("[{}]", fields.join(", "));
            }
        }
    }

    Ok(())
}
