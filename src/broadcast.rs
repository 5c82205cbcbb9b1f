use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::NotificationEvent;

type Registry = Mutex<HashMap<u64, mpsc::UnboundedSender<NotificationEvent>>>;

/// Fan-out of report notifications to every connected UI client.
#[derive(Clone, Default)]
pub struct Broadcaster {
    clients: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

/// A registered client. Dropping it removes the client from the registry.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
    clients: Arc<Registry>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.lock().insert(id, sender);
        debug!(client_id = id, "client subscribed");
        Subscription {
            id,
            receiver,
            clients: Arc::clone(&self.clients),
        }
    }

    /// Best-effort send to every client registered right now. Returns how many
    /// clients the event was handed to.
    pub fn publish(&self, event: &NotificationEvent) -> usize {
        let mut clients = self.clients.lock();
        clients.retain(|_, sender| sender.send(event.clone()).is_ok());
        clients.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.clients.lock().len()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.clients.lock().remove(&self.id);
        debug!(client_id = self.id, "client unsubscribed");
    }
}
