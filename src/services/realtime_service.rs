use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::models::{EventEnvelope, PollEvent};
use crate::redis::RedisClient;

const CHANNEL_CAPACITY: usize = 256;

pub const POLL_CHANNEL_PATTERN: &str = "poll_updates:*";

pub fn poll_channel(poll_id: Uuid) -> String {
    format!("poll_updates:{}", poll_id)
}

/// Observable state of the cross-instance event connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Per-poll broadcast fan-out. Every successfully written vote and every
/// status change is published here; subscribers receive all events for
/// their poll, their own votes included.
pub struct RealtimeHub {
    instance_id: Uuid,
    channels: Mutex<HashMap<Uuid, broadcast::Sender<PollEvent>>>,
    redis: Option<Arc<RedisClient>>,
    state_tx: watch::Sender<ConnectionState>,
}

impl RealtimeHub {
    /// Local-only hub, no cross-instance fan-out.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            instance_id: Uuid::new_v4(),
            channels: Mutex::new(HashMap::new()),
            redis: None,
            state_tx,
        }
    }

    /// Hub that mirrors every publication onto Redis so other instances see
    /// it. Pair with [`spawn_redis_bridge`] to receive theirs.
    pub fn with_redis(redis: Arc<RedisClient>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            instance_id: Uuid::new_v4(),
            channels: Mutex::new(HashMap::new()),
            redis: Some(redis),
            state_tx,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(self: &Arc<Self>, poll_id: Uuid) -> PollSubscription {
        let mut channels = self.channels.lock().unwrap();
        let tx = channels
            .entry(poll_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        PollSubscription {
            poll_id,
            rx: tx.subscribe(),
            hub: Arc::clone(self),
        }
    }

    /// Publish locally and, when configured, to Redis. A Redis failure only
    /// delays cross-instance delivery; local subscribers are already served,
    /// so it is logged rather than propagated.
    pub async fn publish(&self, event: PollEvent) {
        self.publish_local(event.clone());

        if let Some(redis) = &self.redis {
            let envelope = EventEnvelope {
                origin: self.instance_id,
                event: event.clone(),
            };
            let payload = match serde_json::to_string(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("Failed to encode poll event: {}", e);
                    return;
                }
            };
            if let Err(e) = redis.publish(&poll_channel(event.poll_id()), &payload).await {
                tracing::warn!("Failed to publish poll event to redis: {}", e);
            }
        }
    }

    fn publish_local(&self, event: PollEvent) {
        let channels = self.channels.lock().unwrap();
        if let Some(tx) = channels.get(&event.poll_id()) {
            // Send only fails when no receiver is listening.
            let _ = tx.send(event);
        }
    }

    /// Number of polls with at least one live subscription.
    pub fn active_channels(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber sees on the stream. A lagged subscription has missed
/// events; the subscriber must resync by re-querying counts, not by trying
/// to reconstruct the gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(PollEvent),
    Lagged,
    Closed,
}

/// RAII subscription to a poll's event stream. Dropping it unsubscribes
/// promptly and releases the per-poll channel once the last subscriber is
/// gone.
pub struct PollSubscription {
    poll_id: Uuid,
    rx: broadcast::Receiver<PollEvent>,
    hub: Arc<RealtimeHub>,
}

impl PollSubscription {
    pub async fn recv(&mut self) -> Delivery {
        match self.rx.recv().await {
            Ok(event) => Delivery::Event(event),
            Err(broadcast::error::RecvError::Lagged(_)) => Delivery::Lagged,
            Err(broadcast::error::RecvError::Closed) => Delivery::Closed,
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        let mut channels = self.hub.channels.lock().unwrap();
        if let Some(tx) = channels.get(&self.poll_id) {
            // Our receiver is still counted until after this body runs.
            if tx.receiver_count() <= 1 {
                channels.remove(&self.poll_id);
            }
        }
    }
}

/// Bridge remote instances' publications into the local hub. Reconnects with
/// backoff on failure; a reconnect leaves a gap, which subscribers observe
/// through the connection state and handle by resyncing.
pub fn spawn_redis_bridge(
    hub: Arc<RealtimeHub>,
    redis: Arc<RedisClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = Duration::from_secs(1);
        loop {
            let _ = hub.state_tx.send(ConnectionState::Reconnecting);
            match redis.psubscribe(POLL_CHANNEL_PATTERN).await {
                Ok(mut pubsub) => {
                    let _ = hub.state_tx.send(ConnectionState::Connected);
                    backoff = Duration::from_secs(1);

                    let mut stream = pubsub.on_message();
                    while let Some(msg) = stream.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::warn!("Unreadable poll event payload: {}", e);
                                continue;
                            }
                        };
                        match serde_json::from_str::<EventEnvelope>(&payload) {
                            // Our own publication already reached local
                            // subscribers directly.
                            Ok(envelope) if envelope.origin == hub.instance_id => {}
                            Ok(envelope) => hub.publish_local(envelope.event),
                            Err(e) => tracing::warn!("Malformed poll event: {}", e),
                        }
                    }
                    tracing::warn!("Realtime subscription stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::error!("Realtime subscription failed: {}", e);
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(30));
        }
    })
}
