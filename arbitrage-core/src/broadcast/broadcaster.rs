//! Fan-out to observers with per-observer failure isolation

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::messages::ObserverMessage;
use super::registry::{ObserverRegistry, Payload};
use crate::aggregation::PriceStore;

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub snapshot_interval: Duration,
    /// Outbound messages buffered per observer before new ones are dropped
    pub observer_queue_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_millis(200),
            observer_queue_capacity: 256,
        }
    }
}

pub struct Broadcaster {
    registry: Arc<ObserverRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ObserverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }

    /// Serialize once and enqueue for every observer; returns deliveries.
    ///
    /// Never blocks. An observer whose queue is closed has gone away and is
    /// removed; one whose queue is full misses this message only.
    pub fn publish(&self, message: &ObserverMessage) -> usize {
        let payload: Payload = match serde_json::to_string(message) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize {} message: {}", message.kind(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, outbound) in self.registry.snapshot() {
            match outbound.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!("Observer {} is behind, dropping {} message", id, message.kind());
                }
                Err(TrySendError::Closed(_)) => {
                    if self.registry.remove(&id) {
                        info!("Observer {} removed after write failure ({} live)", id, self.registry.len());
                    }
                }
            }
        }
        delivered
    }

    /// Push the full price map every `interval`, skipping while it is empty
    pub fn spawn_snapshot_loop(self: Arc<Self>, store: Arc<PriceStore>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if store.is_empty() || self.registry.is_empty() {
                    continue;
                }
                let message = ObserverMessage::Prices {
                    prices: store.full_snapshot(),
                };
                if self.publish(&message) == 0 {
                    warn!("Price snapshot reached no observers");
                }
            }
        })
    }
}
