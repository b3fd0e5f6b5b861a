//! Tidings - bucket event notifications for object storage
//!
//! Runs the management API and webhook dispatcher, and offers offline
//! commands for working with stored notification configurations.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidings_core::config::{LoggingConfig, TidingsConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tidings")]
#[command(author = "Tidings Team")]
#[command(version = tidings_core::VERSION)]
#[command(about = "Bucket event notifications to webhooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "TIDINGS_BIND_ADDRESS", global = true)]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, env = "TIDINGS_PORT", global = true)]
    port: Option<u16>,

    /// Config store backend (memory, sqlite)
    #[arg(long, env = "TIDINGS_STORE_BACKEND", global = true)]
    store: Option<String>,

    /// SQLite database URL
    #[arg(long, env = "TIDINGS_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TIDINGS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, env = "TIDINGS_LOG_FORMAT", global = true)]
    log_format: Option<String>,
}

/// Selects one bucket
#[derive(clap::Args, Debug, Clone)]
pub struct BucketArgs {
    /// Bucket name
    #[arg(short, long)]
    pub bucket: String,

    /// Tenant id; omit for buckets without a tenant
    #[arg(short, long)]
    pub tenant: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server and dispatcher (default)
    Serve,

    /// Check a configuration document without storing it
    Validate {
        /// JSON configuration document
        file: PathBuf,
    },

    /// Print a bucket's stored configuration
    Get {
        #[command(flatten)]
        bucket: BucketArgs,
    },

    /// Store a configuration document for a bucket
    Put {
        #[command(flatten)]
        bucket: BucketArgs,

        /// JSON configuration document
        file: PathBuf,
    },

    /// Remove a bucket's configuration
    Delete {
        #[command(flatten)]
        bucket: BucketArgs,
    },

    /// Send one synthetic event through the pipeline and wait for delivery
    TestEvent {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Object key
        #[arg(short, long, default_value = "tidings-test-object")]
        key: String,

        /// Event type
        #[arg(short, long, default_value = tidings_core::types::event_type::OBJECT_CREATED_PUT)]
        event: String,

        /// Object size in bytes
        #[arg(long, default_value_t = 0)]
        size: i64,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        TidingsConfig::from_file(config_path)?
    } else {
        TidingsConfig::from_env()
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(store) = cli.store {
        config.store.backend = store;
    }
    if let Some(url) = cli.database_url {
        config.store.database_url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;

    init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            print_banner();
            commands::serve(config).await?;
        }
        Commands::Validate { file } => commands::validate(&file)?,
        Commands::Get { bucket } => commands::get(&config, &bucket).await?,
        Commands::Put { bucket, file } => commands::put(&config, &bucket, &file).await?,
        Commands::Delete { bucket } => commands::delete(&config, &bucket).await?,
        Commands::TestEvent {
            bucket,
            key,
            event,
            size,
        } => commands::test_event(&config, &bucket, key, event, size).await?,
        Commands::Version => {
            println!("tidings {}", tidings_core::VERSION);
        }
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn print_banner() {
    eprintln!(
        r#"
   _   _     _ _
  | |_(_) __| (_)_ __   __ _ ___
  | __| |/ _` | | '_ \ / _` / __|
  | |_| | (_| | | | | | (_| \__ \
   \__|_|\__,_|_|_| |_|\__, |___/
                       |___/
   Bucket event notifications
   Version: {}
"#,
        tidings_core::VERSION
    );
}
