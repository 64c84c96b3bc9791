//! `plcbridge-middleware` – message plumbing.
//!
//! Routes messages between the bridge core and the outside world without
//! caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, topic-addressed publish/subscribe bus built on a
//!   Tokio broadcast channel, with MQTT-style `+` / `#` filters.
//! - [`transport`] – The [`Transport`] trait: the minimal publish/subscribe
//!   capability the bridge core depends on.
//! - [`mqtt`] – [`Transport`] on an MQTT broker, with its reconnecting
//!   connection driver.
//! - [`gateway`] – WebSocket gateway that lets external processes publish to
//!   and subscribe on the bus using JSON frames.

pub mod bus;
pub mod gateway;
pub mod mqtt;
pub mod transport;

pub use bus::{BusMessage, EventBus, TopicSubscriber, topic_matches};
pub use gateway::WsGateway;
pub use mqtt::{MqttConnection, MqttSettings, MqttTransport, parse_broker};
pub use transport::Transport;
