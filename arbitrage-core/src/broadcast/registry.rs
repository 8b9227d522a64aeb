//! Connected observer membership

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type ObserverId = String;

/// A serialized message, shared by every observer it is sent to
pub type Payload = Arc<str>;

/// Registry membership is the only notion of "connected".
///
/// Each observer owns a bounded outbound queue drained by a single writer
/// task, which is the one place that writes to its transport.
pub struct ObserverRegistry {
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<Payload>>>,
    queue_capacity: usize,
}

impl ObserverRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add an observer; the receiver feeds its writer task
    pub fn register(&self) -> (ObserverId, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = nanoid::nanoid!(10);
        self.observers.write().insert(id.clone(), tx);
        (id, rx)
    }

    /// Returns whether the observer was still registered
    pub fn remove(&self, id: &str) -> bool {
        self.observers.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.observers.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Copy of the current membership, taken under the lock and released
    /// before the caller does any I/O
    pub fn snapshot(&self) -> Vec<(ObserverId, mpsc::Sender<Payload>)> {
        self.observers
            .read()
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}
