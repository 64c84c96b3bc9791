//! Instant actions published on
//! `<prefix>/<manufacturer>/<serial>/instantActions`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;
use crate::order::{ActionParameter, BlockingType};

/// Action type understood by the robot as "abort the current order".
pub const CANCEL_ORDER: &str = "cancelOrder";

/// Envelope for one or more instant actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantActions {
    pub header_id: i64,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub actions: Vec<InstantAction>,
}

impl InstantActions {
    pub fn new(
        header_id: i64,
        manufacturer: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            header_id,
            timestamp: Utc::now(),
            version: PROTOCOL_VERSION.to_string(),
            manufacturer: manufacturer.into(),
            serial_number: serial_number.into(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantAction {
    pub action_type: String,
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_description: Option<String>,
    pub blocking_type: BlockingType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_parameters: Vec<ActionParameter>,
}

impl InstantAction {
    /// A HARD-blocking `cancelOrder`. It names no order: the robot cancels
    /// whichever order it is currently executing.
    pub fn cancel_order(action_id: impl Into<String>) -> Self {
        Self {
            action_type: CANCEL_ORDER.to_string(),
            action_id: action_id.into(),
            action_description: None,
            blocking_type: BlockingType::Hard,
            action_parameters: Vec::new(),
        }
    }
}
