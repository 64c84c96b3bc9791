//! `plcbridge-types` – shared vocabulary of the PLC ⇄ AGV bridge.
//!
//! # Modules
//!
//! - [`order`] – the order document sent to the robot (one node, one action
//!   for every direct action the PLC triggers).
//! - [`instant_actions`] – out-of-band robot instructions, used here only for
//!   `cancelOrder`.
//! - [`state`] – the strongly-typed subset of the robot state report the
//!   bridge consumes.
//! - [`plc`] – the PLC-facing status letters and the `BASE:LETTER` response.
//!
//! [`BridgeError`] is the single error type shared by every crate in the
//! workspace.

use thiserror::Error;

pub mod instant_actions;
pub mod order;
pub mod plc;
pub mod state;

pub use instant_actions::{InstantAction, InstantActions};
pub use order::{Action, ActionParameter, BlockingType, Edge, Node, NodePosition, Order};
pub use plc::{PlcResponse, PlcStatus, base_command};
pub use state::{ActionState, ActionStatus, StateReport};

/// Protocol version stamped on every document sent to the robot.
pub const PROTOCOL_VERSION: &str = "2.0.0";

/// Errors raised while translating between the PLC and the robot.
///
/// Each variant corresponds to one failure class of a single command or
/// report cycle; none of them is ever retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Malformed command: {0:?}")]
    MalformedCommand(String),

    #[error("Unsupported command type {0:?}")]
    UnsupportedCommandType(char),

    #[error("No active order matches cancel for {0:?}")]
    CancelTargetNotFound(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Malformed state report: {0}")]
    MalformedReport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// RFC 3339 timestamps with nanosecond precision and a `Z` suffix, the format
/// the robot expects in every header.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn bridge_error_display() {
        let err = BridgeError::UnsupportedCommandType('X');
        assert!(err.to_string().contains("'X'"));

        let err = BridgeError::CancelTargetNotFound("PICK".to_string());
        assert!(err.to_string().contains("PICK"));
    }

    #[test]
    fn timestamp_has_nanosecond_precision() {
        #[derive(Serialize)]
        struct Stamp {
            #[serde(with = "timestamp")]
            at: chrono::DateTime<chrono::Utc>,
        }

        let at = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00.5Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        assert_eq!(json, r#"{"at":"2024-05-01T12:00:00.500000000Z"}"#);
    }
}
