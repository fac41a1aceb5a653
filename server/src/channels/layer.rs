//! In-process channel layer
//!
//! Two primitives: named inboxes with exactly one consumer each, and groups that fan a
//! message out to every current subscriber. Group keys are prefixed with `_` so they
//! cannot collide with inbox names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::debug;

use crate::errors::KabinetError;

const DEFAULT_CAPACITY: usize = 1024;

/// A message delivered to a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// `backend.<channel>`
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    pub fn new(channel: &str, payload: serde_json::Value) -> Self {
        Self {
            kind: message_kind(channel),
            payload,
        }
    }
}

pub fn message_kind(channel: &str) -> String {
    format!("backend.{}", channel)
}

fn group_key(group: &str) -> String {
    format!("_{}", group)
}

pub struct ChannelLayer {
    capacity: usize,
    inboxes: RwLock<HashMap<String, mpsc::Sender<serde_json::Value>>>,
    groups: RwLock<HashMap<String, broadcast::Sender<ChannelMessage>>>,
}

impl ChannelLayer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inboxes: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Become the consumer of an inbox. A second bind replaces the first consumer.
    pub async fn bind_inbox(&self, name: &str) -> mpsc::Receiver<serde_json::Value> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.inboxes.write().await.insert(name.to_string(), tx);
        debug!("Bound inbox {}", name);
        rx
    }

    /// Queue a message for the inbox consumer
    pub async fn send(&self, name: &str, message: serde_json::Value) -> Result<(), KabinetError> {
        let tx = self
            .inboxes
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| KabinetError::ChannelError(format!("no consumer bound to {}", name)))?;

        tx.send(message)
            .await
            .map_err(|_| KabinetError::ChannelError(format!("consumer of {} has stopped", name)))
    }

    /// Deliver to every current subscriber of the group. Returns how many received it.
    ///
    /// A group nobody listens to is forgotten.
    pub async fn group_send(&self, group: &str, message: ChannelMessage) -> usize {
        let key = group_key(group);
        let Some(tx) = self.groups.read().await.get(&key).cloned() else {
            return 0;
        };

        let delivered = tx.send(message).unwrap_or(0);
        if delivered == 0 {
            let mut groups = self.groups.write().await;
            if groups.get(&key).is_some_and(|tx| tx.receiver_count() == 0) {
                groups.remove(&key);
                debug!("Dropped group {} with no listeners", group);
            }
        }
        delivered
    }

    /// Join a group. Groups whose listeners have all gone are dropped on the way.
    pub async fn group_subscribe(&self, group: &str) -> broadcast::Receiver<ChannelMessage> {
        let mut groups = self.groups.write().await;
        groups.retain(|_, tx| tx.receiver_count() > 0);
        groups
            .entry(group_key(group))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of groups currently held
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

impl Default for ChannelLayer {
    fn default() -> Self {
        Self::new()
    }
}
