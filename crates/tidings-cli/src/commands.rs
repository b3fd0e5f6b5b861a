//! Subcommand implementations

use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;
use tidings_api::{ApiServer, AppState, MetricsRecorder};
use tidings_core::config::{StoreConfig, TidingsConfig};
use tidings_core::types::{EventInfo, NotificationConfiguration};
use tidings_core::utils::format_event_time;
use tidings_events::NotificationManager;
use tidings_store::{ConfigStore, MemoryConfigStore, SqliteConfigStore};
use tracing::{info, warn};

use crate::BucketArgs;

pub async fn serve(config: TidingsConfig) -> anyhow::Result<()> {
    info!("Starting Tidings...");
    info!("Config store: {}", config.store.backend);

    let store = open_store(&config.store).await?;
    let manager = Arc::new(NotificationManager::from_config(store, &config)?);
    let metrics = Arc::new(MetricsRecorder::install()?);
    let state = AppState::new(manager.clone()).with_metrics(metrics);

    let grace = config.shutdown_grace();
    ApiServer::new(config, state).run(shutdown_signal()).await?;

    info!("Draining webhook deliveries (grace {:?})", grace);
    if !manager.shutdown(grace).await {
        warn!("Some webhook deliveries were abandoned at shutdown");
    }
    Ok(())
}

/// Documents without `bucketName` get their bucket from `put` or the URL
/// path, so only their rules are checked.
pub fn validate(file: &Path) -> anyhow::Result<()> {
    let config = read_document(file)?;
    let checked = if config.bucket_name.is_empty() && config.tenant_id.is_none() {
        config.validate_rules()
    } else {
        config.validate()
    };
    checked.with_context(|| format!("{} is not a valid configuration", file.display()))?;

    println!(
        "{}: OK ({} rules, {} enabled)",
        file.display(),
        config.rules.len(),
        config.rules.iter().filter(|r| r.enabled).count()
    );
    Ok(())
}

pub async fn get(config: &TidingsConfig, bucket: &BucketArgs) -> anyhow::Result<()> {
    let manager = offline_manager(config).await?;

    match manager
        .get_configuration(bucket.tenant.as_deref(), &bucket.bucket)
        .await?
    {
        Some(stored) => println!("{}", serde_json::to_string_pretty(stored.as_ref())?),
        None => bail!("no notification configuration for bucket '{}'", bucket.bucket),
    }
    Ok(())
}

pub async fn put(config: &TidingsConfig, bucket: &BucketArgs, file: &Path) -> anyhow::Result<()> {
    let manager = offline_manager(config).await?;

    let mut document = read_document(file)?;
    document.bucket_name = bucket.bucket.clone();
    document.tenant_id = bucket.tenant.clone();

    let stored = manager.put_configuration(document).await?;
    println!(
        "Stored {} rules for {} at {}",
        stored.rules.len(),
        stored.bucket_path()?,
        format_event_time(&stored.last_updated)
    );
    Ok(())
}

pub async fn delete(config: &TidingsConfig, bucket: &BucketArgs) -> anyhow::Result<()> {
    let manager = offline_manager(config).await?;
    manager
        .delete_configuration(bucket.tenant.as_deref(), &bucket.bucket)
        .await?;
    println!("Deleted notification configuration for bucket '{}'", bucket.bucket);
    Ok(())
}

pub async fn test_event(
    config: &TidingsConfig,
    bucket: &BucketArgs,
    key: String,
    event_type: String,
    size: i64,
) -> anyhow::Result<()> {
    let store = open_store(&config.store).await?;
    let manager = NotificationManager::from_config(store, config)?;

    let mut event = EventInfo::new(bucket.tenant.as_deref(), &bucket.bucket, key, event_type);
    event.size = size;
    event.user_id = "tidings-cli".to_string();
    event.source_ip = "127.0.0.1".to_string();

    let scheduled = manager.notify(&event).await?;
    println!("Scheduled {} deliveries", scheduled);

    let drained = manager.shutdown(config.shutdown_grace()).await;
    let stats = manager.dispatcher().stats();
    println!(
        "Delivered: {}  Failed: {}  Dropped: {}",
        stats.delivered, stats.failed, stats.dropped
    );

    if !drained {
        bail!("deliveries did not finish within the shutdown grace period");
    }
    if stats.failed > 0 || stats.dropped > 0 {
        bail!("{} deliveries did not succeed", stats.failed + stats.dropped);
    }
    Ok(())
}

async fn offline_manager(config: &TidingsConfig) -> anyhow::Result<NotificationManager> {
    if config.store.backend == "memory" {
        warn!("The memory store does not persist anything; this command has no lasting effect");
    }
    let store = open_store(&config.store).await?;
    Ok(NotificationManager::from_config(store, config)?)
}

async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ConfigStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryConfigStore::new())),
        "sqlite" => {
            ensure_database_dir(&config.database_url)?;
            let store = SqliteConfigStore::new(&config.database_url, config.max_connections).await?;
            Ok(Arc::new(store))
        }
        other => bail!("unknown store backend '{}'", other),
    }
}

/// SQLite creates the database file but not the directory holding it.
fn ensure_database_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);

    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(path)
    }
}

fn read_document(file: &Path) -> anyhow::Result<NotificationConfiguration> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", file.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
