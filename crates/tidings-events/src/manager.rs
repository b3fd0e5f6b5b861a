//! Notification manager
//!
//! Entry point used by the storage engine and the management API. Owns the
//! configuration cache and composes it with the store, the rule matcher, the
//! event builder and the dispatcher.
//!
//! Writes (put/delete) go to the store first and touch the cache only after
//! the store accepted them. They are serialized through a write gate, so two
//! writes to the same bucket path land in the cache in the order they landed
//! in the store.

use bytes::Bytes;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tidings_core::codec;
use tidings_core::types::{BucketPath, EventInfo, NotificationConfiguration, WebhookPayload};
use tidings_core::{Error, Result, TidingsConfig};
use tidings_store::ConfigStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::builder::EventBuilder;
use crate::cache::{CacheLookup, ConfigCache};
use crate::dispatcher::{Delivery, Dispatcher};
use crate::matcher;

pub struct NotificationManager {
    store: Arc<dyn ConfigStore>,
    cache: ConfigCache,
    builder: EventBuilder,
    dispatcher: Dispatcher,
    write_gate: Mutex<()>,
    store_timeout: Duration,
}

impl NotificationManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        dispatcher: Dispatcher,
        config: &TidingsConfig,
    ) -> Self {
        Self {
            store,
            cache: ConfigCache::with_absent_limit(config.store.absent_cache_entries),
            builder: EventBuilder::new(&config.events),
            dispatcher,
            write_gate: Mutex::new(()),
            store_timeout: config.store.timeout(),
        }
    }

    /// Build a manager with its own dispatcher. Must be called from within a
    /// Tokio runtime.
    pub fn from_config(store: Arc<dyn ConfigStore>, config: &TidingsConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config.dispatcher)?;
        Ok(Self::new(store, dispatcher, config))
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Configuration of a bucket, or `None` if it has none.
    pub async fn get_configuration(
        &self,
        tenant_id: Option<&str>,
        bucket_name: &str,
    ) -> Result<Option<Arc<NotificationConfiguration>>> {
        let path = BucketPath::new(tenant_id, bucket_name)?;
        self.load(&path).await
    }

    /// Validate and store `config`, fully replacing any previous configuration
    /// of its bucket. Returns the configuration as stored, with
    /// `last_updated` set to now.
    ///
    /// Invalid input is rejected before any I/O. If the store write fails the
    /// cache is left untouched.
    pub async fn put_configuration(
        &self,
        mut config: NotificationConfiguration,
    ) -> Result<Arc<NotificationConfiguration>> {
        config.validate()?;
        let path = config.bucket_path()?;

        let _gate = self.write_gate.lock().await;

        config.last_updated = Utc::now();
        let bytes = codec::encode(&config)?;
        self.with_timeout("put", self.store.put(&path.store_key(), Bytes::from(bytes)))
            .await?;

        let config = Arc::new(config);
        self.cache.set(path.clone(), config.clone());

        info!(
            bucket = %path,
            rules = config.rules.len(),
            updated_by = %config.last_updated_by,
            "Notification configuration stored"
        );
        Ok(config)
    }

    /// Remove a bucket's configuration. Removing one that does not exist
    /// succeeds.
    pub async fn delete_configuration(
        &self,
        tenant_id: Option<&str>,
        bucket_name: &str,
    ) -> Result<()> {
        let path = BucketPath::new(tenant_id, bucket_name)?;

        let _gate = self.write_gate.lock().await;

        self.with_timeout("delete", self.store.delete(&path.store_key()))
            .await?;
        self.cache.invalidate(&path);

        info!(bucket = %path, "Notification configuration deleted");
        Ok(())
    }

    /// Schedule a webhook delivery for every rule of the event's bucket that
    /// matches it. Returns the number of deliveries scheduled.
    ///
    /// Only the configuration lookup can fail. Deliveries run in the
    /// background and their outcome is visible in logs and metrics only.
    pub async fn notify(&self, event: &EventInfo) -> Result<usize> {
        let path = event.bucket_path()?;

        let Some(config) = self.load(&path).await? else {
            debug!(bucket = %path, "No notification configuration");
            return Ok(0);
        };

        let mut scheduled = 0;
        for rule in matcher::matching_rules(&config, event) {
            let mut record = self.builder.build(event);
            record.s3.configuration_id = Some(rule.id.clone());

            let delivery = match Delivery::for_rule(rule, &path, &WebhookPayload::single(record)) {
                Ok(delivery) => delivery,
                Err(e) => {
                    warn!(bucket = %path, rule_id = %rule.id, "Failed to render event: {}", e);
                    continue;
                }
            };

            if self.dispatcher.schedule(delivery) {
                scheduled += 1;
            }
        }

        debug!(
            bucket = %path,
            key = %event.object_key,
            event_type = %event.event_type,
            scheduled,
            "Event processed"
        );
        Ok(scheduled)
    }

    /// Drain the dispatcher. See [`Dispatcher::shutdown`].
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.dispatcher.shutdown(grace).await
    }

    async fn load(&self, path: &BucketPath) -> Result<Option<Arc<NotificationConfiguration>>> {
        match self.cache.lookup(path) {
            CacheLookup::Hit(config) => return Ok(Some(config)),
            CacheLookup::Absent => return Ok(None),
            CacheLookup::Miss => {}
        }

        let epoch = self.cache.epoch();
        let loaded = match self
            .with_timeout("get", self.store.get(&path.store_key()))
            .await?
        {
            Some(bytes) => Some(Arc::new(codec::decode(&bytes)?)),
            None => None,
        };

        if self.cache.fill(path.clone(), loaded.clone(), epoch) {
            return Ok(loaded);
        }

        // A write landed while loading; prefer what it left in the cache.
        match self.cache.lookup(path) {
            CacheLookup::Hit(config) => Ok(Some(config)),
            CacheLookup::Absent => Ok(None),
            CacheLookup::Miss => Ok(loaded),
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.store_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "config store {} ({}) exceeded {:?}",
                operation,
                self.store.backend(),
                self.store_timeout
            ))),
        }
    }
}
