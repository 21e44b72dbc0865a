//! # Broadcast Hub
//!
//! Process-wide mapping from call id to the set of live subscriptions, and
//! the fan-out of every call event to all of them.
//!
//! ## Delivery model:
//! Each subscription is a bounded channel with a dedicated consumer on the
//! other end. `publish` sends to all subscribers of a call concurrently,
//! each send bounded by the configured timeout. A subscriber that cannot
//! accept the event in time — or whose receiver is gone — is removed on the
//! spot and logged; the publisher and the remaining subscribers never see
//! the failure.
//!
//! ## Liveness:
//! A call with subscribers but no traffic gets a periodic heartbeat so
//! transport idle timeouts do not fire and observers can distinguish "quiet
//! call" from "dead pipeline". The heartbeat loop is driven by whoever owns
//! the hub (see the coordinator).

use crate::broadcast::subscription::Subscription;
use crate::config::BroadcastConfig;
use crate::events::CallEvent;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Sending half of one subscription.
struct SubscriberHandle {
    id: u64,
    tx: mpsc::Sender<CallEvent>,
}

/// All subscriptions watching one call, plus the last time anything was
/// delivered to them (drives heartbeats).
struct Topic {
    subscribers: Vec<SubscriberHandle>,
    last_event: Instant,
}

/// Process-wide subscriber registry and event fan-out.
pub struct BroadcastHub {
    topics: RwLock<HashMap<String, Topic>>,
    config: BroadcastConfig,
    next_subscriber_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscription for a call.
    ///
    /// ## Parameters:
    /// - **snapshot**: the one historical-replay event a late joiner gets
    ///   (recorded state at subscribe time); `None` for a call with no
    ///   history yet
    ///
    /// Subscribing to a call that has not started is allowed: the observer
    /// simply waits for the live `call_started` event.
    pub fn subscribe(&self, call_id: &str, snapshot: Option<CallEvent>) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        if let Some(event) = snapshot {
            // Fresh channel with capacity >= 1, cannot be full yet
            let _ = tx.try_send(event);
        }

        let mut topics = self.topics.write().unwrap();
        let topic = topics.entry(call_id.to_string()).or_insert_with(|| Topic {
            subscribers: Vec::new(),
            last_event: Instant::now(),
        });
        topic.subscribers.push(SubscriberHandle { id, tx });

        tracing::debug!(call_id = %call_id, subscriber_id = id, "Subscriber registered");
        Subscription::new(id, call_id.to_string(), rx)
    }

    /// Remove a subscription explicitly. Dropping the `Subscription` works
    /// too — the closed channel is noticed at the next delivery — but an
    /// explicit unsubscribe frees the slot immediately.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.remove_subscribers(subscription.call_id(), &[subscription.id()]);
    }

    /// Deliver an event to every current subscriber of a call.
    ///
    /// Sends run concurrently, each bounded by the per-send timeout. Failed
    /// subscribers (slow or disconnected) are removed afterwards; nothing
    /// propagates to the caller.
    pub async fn publish(&self, call_id: &str, event: CallEvent) {
        let targets: Vec<(u64, mpsc::Sender<CallEvent>)> = {
            let mut topics = self.topics.write().unwrap();
            let Some(topic) = topics.get_mut(call_id) else {
                return;
            };
            topic.last_event = Instant::now();
            topic
                .subscribers
                .iter()
                .map(|handle| (handle.id, handle.tx.clone()))
                .collect()
        };

        if targets.is_empty() {
            return;
        }

        let timeout = Duration::from_millis(self.config.send_timeout_ms);
        let sends = targets.iter().map(|(id, tx)| {
            let event = event.clone();
            async move {
                match tokio::time::timeout(timeout, tx.send(event)).await {
                    Ok(Ok(())) => None,
                    // Receiver dropped: the observer disconnected
                    Ok(Err(_)) => Some(*id),
                    // Channel stayed full past the budget: observer too slow
                    Err(_) => Some(*id),
                }
            }
        });

        let failed: Vec<u64> = join_all(sends).await.into_iter().flatten().collect();
        if !failed.is_empty() {
            tracing::warn!(
                call_id = %call_id,
                dropped = failed.len(),
                "Removed unresponsive subscribers"
            );
            self.remove_subscribers(call_id, &failed);
        }
    }

    fn remove_subscribers(&self, call_id: &str, ids: &[u64]) {
        let mut topics = self.topics.write().unwrap();
        if let Some(topic) = topics.get_mut(call_id) {
            topic.subscribers.retain(|handle| !ids.contains(&handle.id));
            if topic.subscribers.is_empty() {
                topics.remove(call_id);
            }
        }
    }

    /// Number of live subscriptions for a call.
    pub fn subscriber_count(&self, call_id: &str) -> usize {
        let topics = self.topics.read().unwrap();
        topics.get(call_id).map_or(0, |topic| topic.subscribers.len())
    }

    /// Heartbeat loop: every interval, calls that saw no event within the
    /// interval get a heartbeat. Runs until the owning task is aborted.
    pub async fn run_heartbeats(&self) {
        let interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let idle: Vec<String> = {
                let topics = self.topics.read().unwrap();
                topics
                    .iter()
                    .filter(|(_, topic)| {
                        !topic.subscribers.is_empty() && topic.last_event.elapsed() >= interval
                    })
                    .map(|(call_id, _)| call_id.clone())
                    .collect()
            };

            for call_id in idle {
                self.publish(&call_id, CallEvent::heartbeat()).await;
            }
        }
    }
}
