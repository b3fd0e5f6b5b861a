//! Event Dispatcher
//!
//! Asynchronous webhook delivery. [`Dispatcher::schedule`] pushes a
//! [`Delivery`] onto a bounded queue and returns immediately; a background
//! worker pulls deliveries off the queue and runs each one, with retries, as
//! its own task. At most `max_concurrent_deliveries` run at the same time.
//!
//! Deliveries are at-most-once-per-attempt and not persisted. Whatever is
//! still queued or in flight when the process dies is lost.

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tidings_core::config::DispatcherConfig;
use tidings_core::types::{BucketPath, NotificationRule, WebhookPayload};
use tidings_core::{Error, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::client::WebhookClient;
use crate::metrics::{self, DeliveryOutcome};
use crate::retry::{RetryDecision, RetryPolicy};

/// One webhook POST to make, fully rendered
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: Uuid,
    pub rule_id: String,
    pub bucket_path: BucketPath,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Delivery {
    /// Render `payload` for `rule`.
    ///
    /// Headers are applied in order: `Content-Type`, the bearer token, then
    /// the rule's custom headers, so a custom header replaces either of the
    /// first two. Headers that are not valid HTTP are skipped.
    pub fn for_rule(
        rule: &NotificationRule,
        bucket_path: &BucketPath,
        payload: &WebhookPayload,
    ) -> Result<Self> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| Error::InternalError(format!("failed to serialize event: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = rule.auth_token.as_deref().filter(|t| !t.is_empty()) {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!(rule_id = %rule.id, "Skipping invalid auth token"),
            }
        }

        for (name, value) in &rule.custom_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(rule_id = %rule.id, header = %name, "Skipping invalid header"),
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            rule_id: rule.id.clone(),
            bucket_path: bucket_path.clone(),
            url: rule.webhook_url.clone(),
            headers,
            body: Bytes::from(body),
        })
    }
}

/// Point-in-time dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Accepted onto the queue
    pub scheduled: u64,
    pub delivered: u64,
    /// Gave up after a permanent error or exhausted retries
    pub failed: u64,
    /// Rejected at intake (queue full or shutting down) or abandoned at shutdown
    pub dropped: u64,
    pub in_flight: usize,
    pub queued: usize,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    in_flight: AtomicUsize,
}

/// State shared by the worker and every delivery task
struct Shared {
    client: WebhookClient,
    policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    /// Stop pulling new work off the queue
    intake: CancellationToken,
    /// Abandon whatever is still running
    abort: CancellationToken,
    counters: Counters,
}

impl Shared {
    fn dropped(&self, delivery: &Delivery, reason: &str) {
        warn!(
            delivery_id = %delivery.id,
            rule_id = %delivery.rule_id,
            bucket = %delivery.bucket_path,
            reason,
            "Dropping webhook delivery"
        );
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_outcome(DeliveryOutcome::Dropped);
    }
}

struct Inner {
    sender: mpsc::Sender<Delivery>,
    accepting: AtomicBool,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Event dispatcher handle
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("accepting", &self.is_accepting())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher and start its worker. Must be called from within
    /// a Tokio runtime.
    pub fn new(config: &DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let shared = Arc::new(Shared {
            client: WebhookClient::new(config)?,
            policy: RetryPolicy::from(&config.retry),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_deliveries)),
            tracker: TaskTracker::new(),
            intake: CancellationToken::new(),
            abort: CancellationToken::new(),
            counters: Counters::default(),
        });

        let worker = tokio::spawn(run(receiver, shared.clone()));

        info!(
            concurrency = config.max_concurrent_deliveries,
            queue_capacity = config.queue_capacity,
            max_attempts = config.retry.max_attempts,
            "Event dispatcher started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                sender,
                accepting: AtomicBool::new(true),
                shared,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Queue `delivery` without waiting. Returns false if it was dropped
    /// because the queue is full or the dispatcher is shutting down.
    pub fn schedule(&self, delivery: Delivery) -> bool {
        let shared = &self.inner.shared;

        if !self.is_accepting() {
            shared.dropped(&delivery, "dispatcher is shutting down");
            return false;
        }

        match self.inner.sender.try_send(delivery) {
            Ok(()) => {
                shared.counters.scheduled.fetch_add(1, Ordering::Relaxed);
                metrics::record_scheduled();
                true
            }
            Err(TrySendError::Full(delivery)) => {
                shared.dropped(&delivery, "delivery queue is full");
                false
            }
            Err(TrySendError::Closed(delivery)) => {
                shared.dropped(&delivery, "dispatcher is stopped");
                false
            }
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DispatchStats {
        let counters = &self.inner.shared.counters;
        let sender = &self.inner.sender;
        DispatchStats {
            scheduled: counters.scheduled.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            in_flight: counters.in_flight.load(Ordering::Relaxed),
            queued: sender.max_capacity() - sender.capacity(),
        }
    }

    /// Stop accepting deliveries and wait up to `grace` for queued and
    /// in-flight ones to finish. Whatever is still pending after that is
    /// abandoned. Returns true if everything drained in time.
    ///
    /// Safe to call more than once; later calls wait on the same drain.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        let shared = &self.inner.shared;

        if self.inner.accepting.swap(false, Ordering::AcqRel) {
            info!(grace_ms = grace.as_millis() as u64, "Event dispatcher draining");
        }
        shared.intake.cancel();

        let worker = self.inner.worker.lock().take();
        let drained = tokio::time::timeout(grace, async {
            if let Some(worker) = worker {
                if let Err(e) = worker.await {
                    error!("Event dispatch worker failed: {}", e);
                }
            }
            shared.tracker.wait().await;
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                in_flight = shared.counters.in_flight.load(Ordering::Relaxed),
                "Shutdown grace period elapsed, abandoning pending deliveries"
            );
            shared.abort.cancel();
            shared.tracker.wait().await;
        }

        info!(stats = ?self.stats(), "Event dispatcher stopped");
        drained
    }
}

async fn run(mut receiver: mpsc::Receiver<Delivery>, shared: Arc<Shared>) {
    debug!("Event dispatch worker started");

    loop {
        let delivery = tokio::select! {
            biased;
            _ = shared.intake.cancelled() => break,
            next = receiver.recv() => match next {
                Some(delivery) => delivery,
                None => break,
            },
        };
        start(&shared, delivery).await;
    }

    // Drain what was accepted before intake stopped.
    receiver.close();
    while let Some(delivery) = receiver.recv().await {
        start(&shared, delivery).await;
    }

    shared.tracker.close();
    debug!("Event dispatch worker stopped");
}

/// Wait for a free slot, then run `delivery` on its own task.
async fn start(shared: &Arc<Shared>, delivery: Delivery) {
    let permit = tokio::select! {
        biased;
        _ = shared.abort.cancelled() => None,
        permit = shared.semaphore.clone().acquire_owned() => permit.ok(),
    };

    let Some(permit) = permit else {
        shared.dropped(&delivery, "dispatcher aborted");
        return;
    };

    let in_flight = shared.counters.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
    metrics::set_in_flight(in_flight);

    let task_shared = shared.clone();
    shared.tracker.spawn(async move {
        deliver(&task_shared, delivery).await;
        drop(permit);

        let in_flight = task_shared.counters.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_in_flight(in_flight);
    });
}

async fn deliver(shared: &Shared, delivery: Delivery) {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = shared.abort.cancelled() => {
                shared.dropped(&delivery, "aborted during request");
                return;
            }
            result = shared.client.send(&delivery, attempt) => result,
        };

        let err = match result {
            Ok(status) => {
                info!(
                    delivery_id = %delivery.id,
                    rule_id = %delivery.rule_id,
                    bucket = %delivery.bucket_path,
                    status,
                    attempts = attempt,
                    "Webhook delivered"
                );
                shared.counters.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::record_outcome(DeliveryOutcome::Delivered);
                return;
            }
            Err(err) => err,
        };

        match shared.policy.decide(attempt, &err) {
            RetryDecision::Retry { delay } => {
                debug!(
                    delivery_id = %delivery.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying webhook delivery"
                );
                metrics::record_outcome(DeliveryOutcome::Retry);

                tokio::select! {
                    biased;
                    _ = shared.abort.cancelled() => {
                        shared.dropped(&delivery, "aborted during backoff");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::GiveUp { reason } => {
                error!(
                    delivery_id = %delivery.id,
                    rule_id = %delivery.rule_id,
                    bucket = %delivery.bucket_path,
                    url = %delivery.url,
                    attempts = attempt,
                    error = %err,
                    "Giving up on webhook delivery: {}",
                    reason
                );
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_outcome(DeliveryOutcome::Failed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::config::RetryConfig;
    use tidings_core::types::event_type::OBJECT_CREATED_ALL;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent_deliveries: 4,
            queue_capacity: 64,
            request_timeout_secs: 5,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 50,
                jitter_factor: 0.0,
            },
            ..Default::default()
        }
    }

    fn rule(url: String) -> NotificationRule {
        NotificationRule::new("rule-1", url, [OBJECT_CREATED_ALL])
    }

    fn delivery(url: String) -> Delivery {
        let path = BucketPath::new(Some("tenant-1"), "test-bucket").unwrap();
        let payload = WebhookPayload { records: vec![] };
        Delivery::for_rule(&rule(url), &path, &payload).unwrap()
    }

    async fn requests(server: &MockServer) -> usize {
        server.received_requests().await.unwrap().len()
    }

    #[test]
    fn test_delivery_headers() {
        let path = BucketPath::new(None, "b").unwrap();
        let payload = WebhookPayload { records: vec![] };

        let rule = rule("http://example.com".into())
            .with_auth_token("secret")
            .with_header("X-Env", "prod");
        let d = Delivery::for_rule(&rule, &path, &payload).unwrap();
        assert_eq!(d.headers[CONTENT_TYPE], "application/json");
        assert_eq!(d.headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(d.headers["x-env"], "prod");
        assert_eq!(&d.body[..], br#"{"Records":[]}"#);
        assert_eq!(d.rule_id, "rule-1");

        // Custom headers win over generated ones.
        let rule = rule
            .with_header("Authorization", "Token abc")
            .with_header("Content-Type", "application/cloudevents+json");
        let d = Delivery::for_rule(&rule, &path, &payload).unwrap();
        assert_eq!(d.headers[AUTHORIZATION], "Token abc");
        assert_eq!(d.headers[CONTENT_TYPE], "application/cloudevents+json");
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let path = BucketPath::new(None, "b").unwrap();
        let payload = WebhookPayload { records: vec![] };
        let rule = rule("http://example.com".into())
            .with_header("bad header", "x")
            .with_header("X-Ok", "y");

        let d = Delivery::for_rule(&rule, &path, &payload).unwrap();
        assert_eq!(d.headers.len(), 2);
        assert_eq!(d.headers["x-ok"], "y");
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        assert!(dispatcher.schedule(delivery(server.uri())));
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(requests(&server).await, 2);
        let stats = dispatcher.stats();
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        dispatcher.schedule(delivery(server.uri()));
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(requests(&server).await, 1);
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        dispatcher.schedule(delivery(server.uri()));
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(requests(&server).await, 3);
        let stats = dispatcher.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_then_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        dispatcher.schedule(delivery(server.uri()));
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(requests(&server).await, 2);
        assert_eq!(dispatcher.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_each_delivery_is_independent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        dispatcher.schedule(delivery(format!("{}/gone", server.uri())));
        dispatcher.schedule(delivery(format!("{}/ok", server.uri())));
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        let stats = dispatcher.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&DispatcherConfig {
            queue_capacity: 1,
            ..config()
        })
        .unwrap();

        // The current-thread runtime does not run the worker between these
        // calls, so only the first fits.
        assert!(dispatcher.schedule(delivery(server.uri())));
        assert!(!dispatcher.schedule(delivery(server.uri())));
        assert!(!dispatcher.schedule(delivery(server.uri())));

        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
        let stats = dispatcher.stats();
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.delivered, 1);
    }

    #[tokio::test]
    async fn test_schedule_after_shutdown_is_rejected() {
        let dispatcher = Dispatcher::new(&config()).unwrap();
        assert!(dispatcher.shutdown(Duration::from_secs(1)).await);
        assert!(!dispatcher.is_accepting());

        assert!(!dispatcher.schedule(delivery("http://127.0.0.1:1".into())));
        assert_eq!(dispatcher.stats().dropped, 1);

        // A second shutdown is a no-op.
        assert!(dispatcher.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_short_grace_abandons_in_flight() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let dispatcher = Dispatcher::new(&config()).unwrap();
        dispatcher.schedule(delivery(server.uri()));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!dispatcher.shutdown(Duration::from_millis(100)).await);
        let stats = dispatcher.stats();
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.in_flight, 0);
    }
}
