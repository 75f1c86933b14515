//! Notification relay
//!
//! Fans out `{type, data}` messages to every open WebSocket connection.
//! There are no rooms, no per-user targeting and no replay: a message
//! reaches whoever is connected at the moment it is broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::metrics::{RELAY_CONNECTIONS_ACTIVE, RELAY_MESSAGES_TOTAL};

/// Identifier handed out on registration
pub type ConnectionId = u64;

/// Message types clients may ask the relay to rebroadcast
pub const REBROADCAST_TYPES: [&str; 2] = ["new_post", "new_like"];

/// Wire envelope shared by inbound and outbound frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RelayMessage {
    pub fn is_rebroadcast(&self) -> bool {
        REBROADCAST_TYPES.contains(&self.kind.as_str())
    }
}

/// Events emitted by successful mutations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RelayEvent {
    NewPost(NewPostEvent),
    NewLike(NewLikeEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostEvent {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub is_repost: bool,
    pub original_post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLikeEvent {
    pub post_id: i64,
    pub user_id: String,
}

impl RelayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::NewPost(_) => "new_post",
            RelayEvent::NewLike(_) => "new_like",
        }
    }
}

/// Sink the services publish events into
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn publish(&self, event: RelayEvent);
}

/// Registry of open connections
///
/// Each connection owns the receiving half of an unbounded channel;
/// the registry keeps the sending halves.
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Arc<str>>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    // Map updates are single calls, so a poisoned lock still holds a valid map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<Arc<str>>>> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<Arc<str>>>> {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a connection and return its outbound receiver
    pub fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut connections = self.write();
        connections.insert(id, tx);
        RELAY_CONNECTIONS_ACTIVE.set(connections.len() as i64);
        tracing::debug!(connection_id = id, open = connections.len(), "Relay connection registered");
        (id, rx)
    }

    /// Remove a connection; unknown ids are ignored
    pub fn unregister(&self, id: ConnectionId) {
        let mut connections = self.write();
        if connections.remove(&id).is_some() {
            RELAY_CONNECTIONS_ACTIVE.set(connections.len() as i64);
            tracing::debug!(connection_id = id, open = connections.len(), "Relay connection closed");
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Send a message to every open connection
    ///
    /// Iterates a snapshot taken under the read lock, so connections may
    /// come and go concurrently. Connections whose receiver is gone are
    /// pruned afterwards.
    ///
    /// # Returns
    /// Number of connections the message was handed to
    pub fn broadcast(&self, message: &RelayMessage) -> usize {
        let frame: Arc<str> = match serde_json::to_string(message) {
            Ok(frame) => frame.into(),
            Err(error) => {
                tracing::error!(%error, kind = %message.kind, "Failed to encode relay message");
                return 0;
            }
        };

        let snapshot: Vec<(ConnectionId, mpsc::UnboundedSender<Arc<str>>)> = self
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(Arc::clone(&frame)).is_ok() {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }

        for id in closed {
            self.unregister(id);
        }

        RELAY_MESSAGES_TOTAL
            .with_label_values(&[message.kind.as_str()])
            .inc();
        tracing::debug!(kind = %message.kind, delivered, "Relay message broadcast");
        delivered
    }
}

impl EventSink for ConnectionRegistry {
    fn publish(&self, event: RelayEvent) {
        let kind = event.kind();
        match serde_json::to_value(&event) {
            Ok(serde_json::Value::Object(mut fields)) => {
                let message = RelayMessage {
                    kind: kind.to_string(),
                    data: fields.remove("data").unwrap_or_default(),
                };
                self.broadcast(&message);
            }
            Ok(_) => tracing::error!(kind, "Relay event did not serialize to an object"),
            Err(error) => tracing::error!(%error, kind, "Failed to encode relay event"),
        }
    }
}

/// Sink that drops every event
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: RelayEvent) {}
}
