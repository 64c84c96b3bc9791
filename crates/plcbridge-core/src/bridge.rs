//! [`Bridge`] – the order-lifecycle correlation engine.
//!
//! Two entry points, one per inbound stream:
//!
//! 1. [`Bridge::handle_command`] – classify a PLC command, then publish an
//!    order (direct action) or a `cancelOrder` instant action and record the
//!    correlation. Rejections are answered with `BASE:F` at once.
//! 2. [`Bridge::handle_state`] – decode a robot state report, settle it
//!    against the [`CorrelationTracker`] and publish the resulting verdict.
//!
//! Both resolve their own errors: nothing is returned to the transport loop
//! except a description of what happened.

use std::sync::Arc;

use plcbridge_middleware::Transport;
use plcbridge_types::{BridgeError, PlcStatus, StateReport};
use tracing::{debug, error, info, trace, warn};

use crate::aggregator::Lane;
use crate::builder::{build_cancel, build_order};
use crate::command::{ParsedCommand, classify};
use crate::ids::IdGenerator;
use crate::response::ResponseEmitter;
use crate::settings::BridgeSettings;
use crate::tracker::{CorrelationTracker, Eviction, Settlement};

/// Longest state payload logged in full at `debug`; the rest goes to `trace`.
const STATE_LOG_PREVIEW: usize = 500;

/// What a PLC command led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// An order was published and recorded as active.
    OrderDispatched { order_id: String },
    /// A cancel was published; `order_id` moved to the canceled map.
    CancelDispatched { order_id: String },
    /// The command was answered with `BASE:F`.
    Rejected { error: BridgeError },
}

pub struct Bridge {
    settings: BridgeSettings,
    transport: Arc<dyn Transport>,
    tracker: CorrelationTracker,
    ids: IdGenerator,
    emitter: ResponseEmitter,
}

impl Bridge {
    pub fn new(settings: BridgeSettings, transport: Arc<dyn Transport>) -> Self {
        let emitter = ResponseEmitter::new(Arc::clone(&transport), settings.response_topic.clone());
        Self {
            settings,
            transport,
            tracker: CorrelationTracker::new(),
            ids: IdGenerator::new(),
            emitter,
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn tracker(&self) -> &CorrelationTracker {
        &self.tracker
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    // ── PLC commands ─────────────────────────────────────────────────────

    pub fn handle_command(&self, payload: &[u8]) -> CommandOutcome {
        let text = String::from_utf8_lossy(payload);
        let command = text.trim();
        info!(command, "PLC command received");

        match classify(command) {
            ParsedCommand::Invalid { error, .. } => self.reject(command, error),
            ParsedCommand::Cancel { base } => self.dispatch_cancel(command, &base),
            parsed => self.dispatch_direct(command, &parsed),
        }
    }

    fn dispatch_direct(&self, command: &str, parsed: &ParsedCommand) -> CommandOutcome {
        let topic = self.settings.order_topic();
        let result = self.tracker.dispatch_order(command, |header_id| {
            let ids = self.ids.next_order_ids();
            let order = build_order(parsed, header_id, &ids, &self.settings)?;
            let payload =
                serde_json::to_vec(&order).map_err(|e| BridgeError::Serialization(e.to_string()))?;
            self.transport.publish(&topic, payload, false)?;
            Ok(order.order_id)
        });

        match result {
            Ok(order_id) => {
                info!(%topic, order_id = %order_id, command, "order published");
                CommandOutcome::OrderDispatched { order_id }
            }
            Err(e) => self.reject(command, e),
        }
    }

    fn dispatch_cancel(&self, command: &str, base: &str) -> CommandOutcome {
        let topic = self.settings.instant_actions_topic();
        let result = self.tracker.dispatch_cancel(base, command, |header_id| {
            let message = build_cancel(header_id, &self.ids.next_id(), &self.settings);
            let payload = serde_json::to_vec(&message)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
            self.transport.publish(&topic, payload, false)
        });

        match result {
            Ok(order_id) => {
                info!(%topic, order_id = %order_id, command, "cancelOrder published; awaiting robot");
                CommandOutcome::CancelDispatched { order_id }
            }
            Err(e) => self.reject(command, e),
        }
    }

    fn reject(&self, command: &str, error: BridgeError) -> CommandOutcome {
        match &error {
            BridgeError::Transport(_) | BridgeError::Serialization(_) => {
                error!(command, error = %error, "command failed");
            }
            _ => warn!(command, error = %error, "command rejected"),
        }
        self.respond(command, PlcStatus::Failed);
        CommandOutcome::Rejected { error }
    }

    fn respond(&self, command: &str, status: PlcStatus) {
        if let Err(e) = self.emitter.emit(command, status) {
            error!(topic = %self.emitter.topic(), command, error = %e, "PLC response not published");
        }
    }

    // ── Robot state reports ──────────────────────────────────────────────

    /// Returns the settlement when the report produced a verdict.
    pub fn handle_state(&self, topic: &str, payload: &[u8]) -> Option<Settlement> {
        log_state_payload(topic, payload);

        let report = match StateReport::from_slice(payload) {
            Ok(report) => report,
            Err(e) => {
                warn!(topic, error = %e, "dropping state report");
                return None;
            }
        };

        if report.order_id.is_empty() {
            debug!(topic, "state report without orderId ignored");
            return None;
        }
        let Some(settled) = self.tracker.settle(&report) else {
            debug!(order_id = %report.order_id, "untracked order or no verdict");
            return None;
        };

        match (settled.lane, settled.verdict) {
            (Lane::Canceled, _) => {
                info!(order_id = %settled.order_id, verdict = ?settled.verdict, "canceled order resolved")
            }
            (Lane::Active, PlcStatus::Failed) => {
                warn!(order_id = %settled.order_id, "action failed")
            }
            (Lane::Active, verdict) => {
                info!(order_id = %settled.order_id, ?verdict, "order progress")
            }
        }
        self.respond(&settled.command, settled.verdict);
        Some(settled)
    }

    // ── Staleness ────────────────────────────────────────────────────────

    /// Evict entries older than the configured TTL and answer each with
    /// `BASE:F`. No-op when no TTL is configured.
    pub fn sweep_stale(&self) -> Vec<Eviction> {
        let Some(ttl) = self.settings.order_ttl else {
            return Vec::new();
        };
        let evicted = self.tracker.evict_stale(ttl);
        for eviction in &evicted {
            warn!(
                order_id = %eviction.order_id,
                command = %eviction.command,
                lane = ?eviction.lane,
                age_ms = eviction.age.as_millis() as u64,
                "evicting stale order"
            );
            self.respond(&eviction.command, PlcStatus::Failed);
        }
        evicted
    }
}

/// Record receipt of a state report at `debug`, truncating long payloads.
fn log_state_payload(topic: &str, payload: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    let text = String::from_utf8_lossy(payload);
    if text.len() > STATE_LOG_PREVIEW {
        let preview: String = text.chars().take(STATE_LOG_PREVIEW).collect();
        debug!(topic, bytes = text.len(), "state received: {preview}... (truncated)");
        trace!(topic, "full state payload: {text}");
    } else {
        debug!(topic, "state received: {text}");
    }
}
