//! The part of the robot state report the bridge cares about.
//!
//! A full state message carries positions, battery, errors and much more.
//! Only `orderId` and `actionStates` are decoded; every other field is
//! ignored so that robots on newer firmware keep working.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::BridgeError;

/// Per-action progress reported by the robot.
///
/// Values outside the known set decode to [`ActionStatus::Unknown`] and do
/// not take part in aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Waiting,
    Initializing,
    Running,
    Paused,
    Finished,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ActionStatus {
    /// Parse a wire status; anything unrecognised is [`ActionStatus::Unknown`].
    pub fn parse(raw: &str) -> Self {
        match raw {
            "WAITING" => ActionStatus::Waiting,
            "INITIALIZING" => ActionStatus::Initializing,
            "RUNNING" => ActionStatus::Running,
            "PAUSED" => ActionStatus::Paused,
            "FINISHED" => ActionStatus::Finished,
            "FAILED" => ActionStatus::Failed,
            _ => ActionStatus::Unknown,
        }
    }
}

/// One entry of `actionStates`.
///
/// Decoding never fails: a non-string `actionId` becomes `""` and a missing,
/// `null` or non-string `actionStatus` becomes [`ActionStatus::Unknown`], so
/// a single odd entry cannot hide its siblings from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub action_id: String,
    pub action_status: ActionStatus,
}

impl ActionState {
    pub fn new(action_id: impl Into<String>, action_status: ActionStatus) -> Self {
        Self {
            action_id: action_id.into(),
            action_status,
        }
    }

    fn from_value(value: &Value) -> Self {
        let action_id = value
            .get("actionId")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let action_status = value
            .get("actionStatus")
            .and_then(Value::as_str)
            .map(ActionStatus::parse)
            .unwrap_or_default();
        Self::new(action_id, action_status)
    }
}

impl<'de> Deserialize<'de> for ActionState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// A robot state report, reduced to order correlation data.
///
/// `action_states` keeps the order of the report; the canceled-order path
/// depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    pub order_id: String,
    pub action_states: Vec<ActionState>,
}

impl StateReport {
    /// Decode a raw state payload.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MalformedReport`] when the payload is not JSON or lacks
    /// `orderId` / `actionStates`.
    pub fn from_slice(payload: &[u8]) -> Result<Self, BridgeError> {
        serde_json::from_slice(payload).map_err(|e| BridgeError::MalformedReport(e.to_string()))
    }
}
