//! MQTT broker transport.
//!
//! [`MqttTransport`] is the [`Transport`] the bridge runs on in production:
//! publishes go straight to the broker at QoS 0, and every inbound publish
//! is fanned out through a private [`EventBus`] so that each
//! [`TopicSubscriber`] sees only the topics its filter matches.
//!
//! The network side lives in [`MqttConnection`], which must be driven by
//! [`MqttConnection::run`]. It reconnects with capped exponential backoff,
//! re-subscribes every registered filter after each connect, and sends a
//! DISCONNECT on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use plcbridge_types::BridgeError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bus::{BusMessage, EventBus, TopicSubscriber, validate_filter};
use crate::transport::Transport;

const DEFAULT_PORT: u16 = 1883;
const REQUEST_CAPACITY: usize = 64;
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);
const FIRST_RETRY: Duration = Duration::from_secs(1);
/// How long a DISCONNECT may take to flush on shutdown.
const DISCONNECT_QUIESCE: Duration = Duration::from_millis(250);

/// Broker connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// `tcp://host:port`, `mqtt://host:port` or bare `host[:port]`.
    pub broker: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    /// Upper bound of the reconnect backoff.
    pub max_reconnect_interval: Duration,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("keep_alive", &self.keep_alive)
            .field("max_reconnect_interval", &self.max_reconnect_interval)
            .finish()
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            broker: "tcp://localhost:1883".to_string(),
            client_id: "DEX0002_DIRECT_BRIDGE".to_string(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(60),
            max_reconnect_interval: Duration::from_secs(10),
        }
    }
}

/// Split a broker URL into host and port.
pub fn parse_broker(url: &str) -> Result<(String, u16), BridgeError> {
    let rest = match url.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some((scheme, _)) => {
            return Err(BridgeError::Transport(format!(
                "unsupported broker scheme {scheme:?} in {url:?}"
            )));
        }
        None => url,
    };
    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| BridgeError::Transport(format!("invalid broker port in {url:?}")))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(BridgeError::Transport(format!("missing broker host in {url:?}")));
    }
    Ok((host.to_string(), port))
}

/// State shared by the transport handle and the connection driver.
#[derive(Default)]
struct Link {
    connected: AtomicBool,
    /// Every filter ever subscribed; replayed after each connect.
    filters: Mutex<Vec<String>>,
}

impl Link {
    fn filters(&self) -> MutexGuard<'_, Vec<String>> {
        self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Publish/subscribe handle onto an MQTT broker.
pub struct MqttTransport {
    client: AsyncClient,
    inbound: EventBus,
    link: Arc<Link>,
}

/// Network driver of an [`MqttTransport`].
pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
    inbound: EventBus,
    link: Arc<Link>,
    max_backoff: Duration,
}

impl MqttTransport {
    /// Build the transport and its connection driver. Nothing touches the
    /// network until [`MqttConnection::run`] is polled.
    pub fn new(settings: &MqttSettings) -> Result<(Self, MqttConnection), BridgeError> {
        let (host, port) = parse_broker(&settings.broker)?;
        let client_id = settings.client_id.trim();
        if client_id.is_empty() {
            return Err(BridgeError::Transport("empty MQTT client id".to_string()));
        }

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(settings.keep_alive.max(MIN_KEEP_ALIVE));
        options.set_clean_session(true);
        if let Some(username) = &settings.username {
            options.set_credentials(username, settings.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let inbound = EventBus::default();
        let link = Arc::new(Link::default());

        let transport = Self {
            client: client.clone(),
            inbound: inbound.clone(),
            link: Arc::clone(&link),
        };
        let connection = MqttConnection {
            client,
            eventloop,
            inbound,
            link,
            max_backoff: settings.max_reconnect_interval.max(FIRST_RETRY),
        };
        Ok((transport, connection))
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    /// Filters registered so far, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.link.filters().clone()
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::Transport("MQTT client is not connected".to_string()));
        }
        let bytes = payload.len();
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| BridgeError::Transport(format!("publish to {topic}: {e}")))?;
        debug!(topic, bytes, retain, "MQTT publish queued");
        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<TopicSubscriber, BridgeError> {
        validate_filter(filter)?;
        let subscriber = self.inbound.subscribe(filter)?;

        let mut filters = self.link.filters();
        if !filters.iter().any(|f| f == filter) {
            filters.push(filter.to_string());
            if self.is_connected() {
                self.client
                    .try_subscribe(filter, QoS::AtMostOnce)
                    .map_err(|e| BridgeError::Transport(format!("subscribe to {filter}: {e}")))?;
            }
        }
        Ok(subscriber)
    }
}

impl MqttConnection {
    /// Drive the connection until `shutdown` reports `true` or is dropped,
    /// then disconnect.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = FIRST_RETRY;
        loop {
            tokio::select! {
                _ = stopped(&mut shutdown) => break,
                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        backoff = FIRST_RETRY;
                        self.on_connected();
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        forward_publish(&self.inbound, publish);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if self.link.connected.swap(false, Ordering::AcqRel) {
                            error!(error = %e, "MQTT connection lost");
                        } else {
                            warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "MQTT connect failed");
                        }
                        tokio::select! {
                            _ = stopped(&mut shutdown) => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                        backoff = (backoff * 2).min(self.max_backoff);
                    }
                },
            }
        }
        self.disconnect().await;
    }

    fn on_connected(&self) {
        let filters = self.link.filters();
        self.link.connected.store(true, Ordering::Release);
        info!(subscriptions = filters.len(), "MQTT client connected");
        for filter in filters.iter() {
            match self.client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                Ok(()) => info!(%filter, "subscribed"),
                Err(e) => error!(%filter, error = %e, "subscription failed"),
            }
        }
    }

    async fn disconnect(mut self) {
        if !self.link.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "MQTT disconnect not queued");
            return;
        }
        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(DISCONNECT_QUIESCE, flush).await.is_err() {
            warn!("MQTT disconnect did not flush in time");
        }
        info!("MQTT client disconnected");
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Hand an inbound broker publish to the local subscribers.
fn forward_publish(inbound: &EventBus, publish: Publish) {
    let mut message = BusMessage::new(publish.topic, publish.payload.to_vec());
    message.retain = publish.retain;
    debug!(topic = %message.topic, bytes = message.payload.len(), "MQTT message received");
    if let Err(e) = inbound.publish(message) {
        warn!(error = %e, "inbound MQTT message dropped");
    }
}
