//! The publish/subscribe capability the bridge is written against.
//!
//! The bridge never speaks directly to a broker. It publishes through a
//! [`Transport`] and consumes [`TopicSubscriber`] streams; the in-process
//! [`EventBus`] is the reference implementation, and the
//! [`WsGateway`][crate::gateway::WsGateway] connects it to the outside world.

use plcbridge_types::BridgeError;

use crate::bus::{BusMessage, EventBus, TopicSubscriber};

/// Every message transport must implement this trait.
///
/// # Contract
///
/// * `publish` – hand `payload` to the transport for delivery on `topic`.
///   It must not block on delivery: success means "accepted for sending",
///   which is all a fire-and-forget protocol can promise.
///
/// * `subscribe` – return a stream of messages whose topic matches the
///   MQTT-style `filter`.
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), BridgeError>;

    fn subscribe(&self, filter: &str) -> Result<TopicSubscriber, BridgeError>;
}

impl Transport for EventBus {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), BridgeError> {
        let mut message = BusMessage::new(topic, payload);
        message.retain = retain;
        EventBus::publish(self, message).map(|_| ())
    }

    fn subscribe(&self, filter: &str) -> Result<TopicSubscriber, BridgeError> {
        EventBus::subscribe(self, filter)
    }
}
