//! PLC-facing status protocol: `BASE:LETTER`, one letter per verdict.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle verdict reported to the PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlcStatus {
    Waiting,
    Initializing,
    Running,
    Success,
    Failed,
}

impl PlcStatus {
    /// Single-letter code on the wire.
    pub fn letter(self) -> char {
        match self {
            PlcStatus::Waiting => 'W',
            PlcStatus::Initializing => 'I',
            PlcStatus::Running => 'R',
            PlcStatus::Success => 'S',
            PlcStatus::Failed => 'F',
        }
    }

    /// `Success` and `Failed` end an order's life in the bridge.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlcStatus::Success | PlcStatus::Failed)
    }
}

/// Return everything before the first `:` (the whole string when there is
/// none).
pub fn base_command(command: &str) -> &str {
    command.split(':').next().unwrap_or(command)
}

/// One outbound status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlcResponse {
    pub base_command: String,
    pub status: PlcStatus,
}

impl PlcResponse {
    /// Build a response for `command`, which may be a raw command string; only
    /// its base is kept.
    pub fn new(command: &str, status: PlcStatus) -> Self {
        Self {
            base_command: base_command(command).to_string(),
            status,
        }
    }
}

impl fmt::Display for PlcResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.base_command, self.status.letter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters() {
        let letters: String = [
            PlcStatus::Waiting,
            PlcStatus::Initializing,
            PlcStatus::Running,
            PlcStatus::Success,
            PlcStatus::Failed,
        ]
        .into_iter()
        .map(PlcStatus::letter)
        .collect();
        assert_eq!(letters, "WIRSF");
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(PlcStatus::Success.is_terminal());
        assert!(PlcStatus::Failed.is_terminal());
        assert!(!PlcStatus::Waiting.is_terminal());
        assert!(!PlcStatus::Initializing.is_terminal());
        assert!(!PlcStatus::Running.is_terminal());
    }

    #[test]
    fn response_keeps_only_base() {
        assert_eq!(PlcResponse::new("MOVE:T:L", PlcStatus::Running).to_string(), "MOVE:R");
        assert_eq!(PlcResponse::new("garbage", PlcStatus::Failed).to_string(), "garbage:F");
        assert_eq!(PlcResponse::new("", PlcStatus::Failed).to_string(), ":F");
    }
}
