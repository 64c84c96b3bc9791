//! Headless, topic-addressed publish/subscribe message bus.
//!
//! Uses a [`tokio::sync::broadcast`] channel under the hood so that every
//! subscriber sees every message without any single subscriber blocking the
//! others. Subscribers filter on MQTT-style topic filters:
//!
//! | Filter | Matches |
//! |---|---|
//! | `bridge/command` | exactly that topic |
//! | `meili/v2/+/+/state` | one arbitrary level per `+` |
//! | `meili/v2/#` | the prefix itself and everything below it |

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use plcbridge_types::BridgeError;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Default channel capacity (number of buffered messages before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// One message travelling over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub payload: Vec<u8>,
    /// Kept for transports with retained-message semantics; the in-process
    /// bus does not store messages.
    pub retain: bool,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    /// Payload as text, replacing invalid UTF-8 sequences.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Check a subscription filter for well-formedness.
///
/// `#` must be the last level and stand alone; `+` must stand alone in its
/// level.
pub fn validate_filter(filter: &str) -> Result<(), BridgeError> {
    if filter.is_empty() {
        return Err(BridgeError::Transport("empty topic filter".to_string()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != levels.len() - 1) {
            return Err(BridgeError::Transport(format!(
                "'#' must be the last level of filter {filter:?}"
            )));
        }
        if level.contains('+') && *level != "+" {
            return Err(BridgeError::Transport(format!(
                "'+' must occupy a whole level of filter {filter:?}"
            )));
        }
    }
    Ok(())
}

/// Return `true` when `topic` is matched by `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Shared message bus. Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `message` to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the message. Having
    /// no subscribers is a normal condition (`Ok(0)`), as on any
    /// fire-and-forget message broker.
    pub fn publish(&self, message: BusMessage) -> Result<usize, BridgeError> {
        if message.topic.is_empty() || message.topic.contains(['+', '#']) {
            return Err(BridgeError::Transport(format!(
                "invalid publish topic {:?}",
                message.topic
            )));
        }
        Ok(self.sender.send(message).unwrap_or(0))
    }

    /// Subscribe to every message whose topic matches `filter`.
    pub fn subscribe(&self, filter: impl Into<String>) -> Result<TopicSubscriber, BridgeError> {
        let filter = filter.into();
        validate_filter(&filter)?;
        Ok(TopicSubscriber {
            filter,
            receiver: self.sender.subscribe(),
        })
    }

    /// Subscribe to the raw, unfiltered stream.
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A subscriber that only delivers messages matching its topic filter.
pub struct TopicSubscriber {
    filter: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl TopicSubscriber {
    /// Wait for the next message that matches this subscriber's filter.
    ///
    /// Returns `None` when the bus is closed and no further messages will
    /// arrive.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if topic_matches(&self.filter, &message.topic) => {
                    return Some(message);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(filter = %self.filter, lagged_by = n, "TopicSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}
