//! Runtime settings of one bridge instance (one PLC, one robot).

use std::time::Duration;

/// Topics, robot identity and lifecycle policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Topic the PLC publishes commands on.
    pub command_topic: String,
    /// Topic the bridge publishes `BASE:LETTER` responses on.
    pub response_topic: String,
    /// Leading levels of every robot topic, e.g. `meili/v2`.
    pub interface_prefix: String,
    pub manufacturer: String,
    pub serial_number: String,
    /// `actionType` of the action built for `BASE:I`.
    pub inference_action_type: String,
    /// `actionType` of the action built for `BASE:T[:ARM]`.
    pub trajectory_action_type: String,
    /// Entries older than this are evicted with a Failed response. `None`
    /// keeps them until the robot reports a terminal state.
    pub order_ttl: Option<Duration>,
    /// How often the staleness sweep runs when `order_ttl` is set.
    pub sweep_interval: Duration,
}

impl BridgeSettings {
    pub fn order_topic(&self) -> String {
        self.robot_topic("order")
    }

    pub fn instant_actions_topic(&self) -> String {
        self.robot_topic("instantActions")
    }

    /// Filter matching state reports from any robot under the prefix.
    pub fn state_filter(&self) -> String {
        format!("{}/+/+/state", self.interface_prefix)
    }

    fn robot_topic(&self, leaf: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.interface_prefix, self.manufacturer, self.serial_number, leaf
        )
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            command_topic: "bridge/command".to_string(),
            response_topic: "bridge/response".to_string(),
            interface_prefix: "meili/v2".to_string(),
            manufacturer: "Roboligent".to_string(),
            serial_number: "DEX0002".to_string(),
            inference_action_type: "Roboligent Robin - Inference".to_string(),
            trajectory_action_type: "Roboligent Robin - Follow Trajectory".to_string(),
            order_ttl: None,
            sweep_interval: Duration::from_secs(5),
        }
    }
}
