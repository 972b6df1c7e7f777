//! Plugin message routing.
//!
//! The host pushes `(plugin, payload)` messages for every plugin over one
//! channel. Transports feed them in through a bounded mpsc channel; the router
//! fans each one out to every subscribed handler. Handlers decide for
//! themselves whether a message is theirs.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Weak;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;
use tracing::trace;

/// Capacity for the transport→router message channel
const PLUGIN_MESSAGE_CHANNEL_SIZE: usize = 256;

pub type PluginMessageSender = mpsc::Sender<PluginMessage>;
pub type PluginMessageReceiver = mpsc::Receiver<PluginMessage>;

/// One message on the host's plugin channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMessage {
    pub plugin: String,
    pub data: Value,
}

/// Receiver side of a subscription
pub trait PluginMessageHandler: Send + Sync {
    fn on_plugin_message(&self, plugin: &str, payload: &Value);
}

type HandlerMap = HashMap<u64, Arc<dyn PluginMessageHandler>>;

#[derive(Default)]
struct RouterInner {
    next_id: AtomicU64,
    handlers: Mutex<HandlerMap>,
}

/// Fans plugin messages out to subscribed handlers.
#[derive(Clone, Default)]
pub struct MessageRouter {
    inner: Arc<RouterInner>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for transports to push messages into `run`
    pub fn channel() -> (PluginMessageSender, PluginMessageReceiver) {
        mpsc::channel(PLUGIN_MESSAGE_CHANNEL_SIZE)
    }

    /// Register a handler. It stays subscribed until the returned
    /// `Subscription` is dropped or unsubscribed.
    pub fn subscribe(&self, handler: Arc<dyn PluginMessageHandler>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = self.inner.handlers.lock() {
            handlers.insert(id, handler);
        }

        Subscription {
            id,
            router: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .lock()
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    /// Deliver one message to every subscriber; returns how many received it.
    pub fn publish(&self, plugin: &str, payload: &Value) -> usize {
        // Snapshot so handlers run without the lock held and may (un)subscribe
        let handlers: Vec<Arc<dyn PluginMessageHandler>> = match self.inner.handlers.lock() {
            Ok(handlers) => handlers.values().cloned().collect(),
            Err(_) => return 0,
        };

        trace!("Routing message from {} to {} handler(s)", plugin, handlers.len());
        for handler in &handlers {
            handler.on_plugin_message(plugin, payload);
        }
        handlers.len()
    }

    /// Route messages from `rx` until every sender is gone.
    pub async fn run(&self, mut rx: PluginMessageReceiver) {
        info!("Message router starting");
        while let Some(msg) = rx.recv().await {
            self.publish(&msg.plugin, &msg.data);
        }
        info!("Message router shutting down");
    }
}

/// Handle for a registered handler; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    router: Weak<RouterInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            if let Ok(mut handlers) = router.handlers.lock() {
                handlers.remove(&self.id);
            }
        }
    }
}

/// Handler that records deliveries for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub messages: Mutex<Vec<PluginMessage>>,
}

#[cfg(test)]
impl RecordingHandler {
    pub fn received(&self) -> Vec<PluginMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl PluginMessageHandler for RecordingHandler {
    fn on_plugin_message(&self, plugin: &str, payload: &Value) {
        self.messages.lock().unwrap().push(PluginMessage {
            plugin: plugin.to_string(),
            data: payload.clone(),
        });
    }
}
