//! WebSocket gateway onto the [`EventBus`].
//!
//! [`WsGateway`] lets processes outside the bridge take part in the bus: an
//! MQTT relay, a PLC simulator, or a test harness connects over WebSocket and
//! exchanges JSON frames.
//!
//! Client → gateway:
//!
//! ```json
//! {"op":"publish","topic":"bridge/command","payload":"PICK:I"}
//! {"op":"subscribe","topic":"bridge/response"}
//! {"op":"unsubscribe","topic":"bridge/response"}
//! ```
//!
//! Gateway → client, for every bus message matching one of the client's
//! filters:
//!
//! ```json
//! {"op":"message","topic":"bridge/response","payload":"PICK:S"}
//! ```
//!
//! Frames the gateway cannot act on are answered with
//! `{"op":"error","message":"..."}`. The gateway does not interpret payloads.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use plcbridge_types::BridgeError;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::bus::{BusMessage, EventBus, topic_matches, validate_filter};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ClientFrame {
    Publish {
        topic: String,
        payload: String,
        #[serde(default)]
        retain: bool,
    },
    Subscribe {
        topic: String,
    },
    Unsubscribe {
        topic: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ServerFrame<'a> {
    Message { topic: &'a str, payload: &'a str },
    Error { message: String },
}

/// Bridge between WebSocket clients and the internal [`EventBus`].
#[derive(Clone)]
pub struct WsGateway {
    bus: Arc<EventBus>,
}

impl WsGateway {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Start a WebSocket server on `addr`.
    ///
    /// Runs until it encounters a fatal bind error; per-client failures are
    /// logged and only end that client's session.
    pub async fn run(self, addr: SocketAddr) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Transport(format!("ws bind error on {addr}: {e}")))?;
        info!(%addr, "WebSocket gateway listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let gateway = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = gateway.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| BridgeError::Transport(format!("ws handshake from {peer}: {e}")))?;
        debug!(peer = %peer, "ws client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut rx = self.bus.subscribe_all();
        let mut filters: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(message) => {
                            if !filters.iter().any(|f| topic_matches(f, &message.topic)) {
                                continue;
                            }
                            let payload = message.payload_str();
                            let frame = ServerFrame::Message { topic: &message.topic, payload: &payload };
                            let json = serde_json::to_string(&frame)
                                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
                            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "ws client lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.apply_frame(&mut filters, text.as_str()) {
                                warn!(peer = %peer, error = %e, "rejected ws frame");
                                let frame = ServerFrame::Error { message: e.to_string() };
                                let json = serde_json::to_string(&frame)
                                    .map_err(|e| BridgeError::Serialization(e.to_string()))?;
                                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(peer = %peer, "ws client disconnected");
        Ok(())
    }

    /// Act on one client frame: publish onto the bus or edit the client's
    /// subscription filters.
    fn apply_frame(&self, filters: &mut Vec<String>, text: &str) -> Result<(), BridgeError> {
        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| BridgeError::Serialization(e.to_string()))?;

        match frame {
            ClientFrame::Publish {
                topic,
                payload,
                retain,
            } => {
                let mut message = BusMessage::new(topic, payload);
                message.retain = retain;
                self.bus.publish(message)?;
            }
            ClientFrame::Subscribe { topic } => {
                validate_filter(&topic)?;
                if !filters.contains(&topic) {
                    filters.push(topic);
                }
            }
            ClientFrame::Unsubscribe { topic } => {
                filters.retain(|f| *f != topic);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gateway() -> (Arc<EventBus>, WsGateway) {
        let bus = Arc::new(EventBus::default());
        let gateway = WsGateway::new(Arc::clone(&bus));
        (bus, gateway)
    }

    #[tokio::test]
    async fn publish_frame_reaches_bus() {
        let (bus, gateway) = make_gateway();
        let mut sub = bus.subscribe("bridge/command").unwrap();
        let mut filters = Vec::new();

        gateway
            .apply_frame(
                &mut filters,
                r#"{"op":"publish","topic":"bridge/command","payload":"PICK:I"}"#,
            )
            .unwrap();

        let message = sub.recv().await.unwrap();
        assert_eq!(message.payload_str(), "PICK:I");
        assert!(filters.is_empty());
    }

    #[test]
    fn subscribe_and_unsubscribe_edit_filters() {
        let (_bus, gateway) = make_gateway();
        let mut filters = Vec::new();

        gateway
            .apply_frame(&mut filters, r#"{"op":"subscribe","topic":"bridge/response"}"#)
            .unwrap();
        gateway
            .apply_frame(&mut filters, r#"{"op":"subscribe","topic":"bridge/response"}"#)
            .unwrap();
        assert_eq!(filters, vec!["bridge/response".to_string()]);

        gateway
            .apply_frame(&mut filters, r#"{"op":"unsubscribe","topic":"bridge/response"}"#)
            .unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn bad_frames_are_rejected() {
        let (_bus, gateway) = make_gateway();
        let mut filters = Vec::new();

        assert!(gateway.apply_frame(&mut filters, "not json").is_err());
        assert!(gateway.apply_frame(&mut filters, r#"{"op":"dance"}"#).is_err());
        assert!(
            gateway
                .apply_frame(&mut filters, r#"{"op":"subscribe","topic":"a/#/b"}"#)
                .is_err()
        );
        assert!(filters.is_empty());
    }

    #[test]
    fn message_frame_shape() {
        let frame = ServerFrame::Message {
            topic: "bridge/response",
            payload: "PICK:S",
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"op":"message","topic":"bridge/response","payload":"PICK:S"}"#
        );
    }
}
