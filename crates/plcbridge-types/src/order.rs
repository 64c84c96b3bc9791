//! Order document published on `<prefix>/<manufacturer>/<serial>/order`.
//!
//! Only the fields the bridge emits are modelled. Optional fields are skipped
//! when `None` so the robot sees exactly what was set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Whether an action lets later actions start before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockingType {
    None,
    Soft,
    Hard,
}

/// A work assignment for the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub header_id: i64,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub order_id: String,
    pub order_update_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_set_id: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Order {
    /// Create an empty order (no nodes, no edges) stamped with the current
    /// time.
    pub fn new(
        header_id: i64,
        manufacturer: impl Into<String>,
        serial_number: impl Into<String>,
        order_id: impl Into<String>,
        order_update_id: u32,
    ) -> Self {
        Self {
            header_id,
            timestamp: Utc::now(),
            version: PROTOCOL_VERSION.to_string(),
            manufacturer: manufacturer.into(),
            serial_number: serial_number.into(),
            order_id: order_id.into(),
            order_update_id,
            zone_set_id: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// A waypoint of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: String,
    pub sequence_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_description: Option<String>,
    pub released: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_position: Option<NodePosition>,
    pub actions: Vec<Action>,
}

/// Position of a node on the robot's map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(
        default,
        rename = "allowedDeviationXY",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_deviation_xy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_deviation_theta: Option<f64>,
    pub map_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_description: Option<String>,
}

impl NodePosition {
    /// Origin of an unnamed map, with every optional field explicitly zeroed.
    ///
    /// Direct actions do not move the robot, but the node still has to carry
    /// a position the robot will accept.
    pub fn origin() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: Some(0.0),
            allowed_deviation_xy: Some(0.0),
            allowed_deviation_theta: Some(0.0),
            map_id: String::new(),
            map_description: Some(String::new()),
        }
    }
}

/// A connection between two nodes. The bridge never emits edges; the type
/// exists so `edges` serializes as a typed empty array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub edge_id: String,
    pub sequence_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_description: Option<String>,
    pub released: bool,
    pub start_node_id: String,
    pub end_node_id: String,
    pub actions: Vec<Action>,
}

/// A discrete behaviour attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action_type: String,
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_description: Option<String>,
    pub blocking_type: BlockingType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_parameters: Vec<ActionParameter>,
}

/// Key/value argument of an [`Action`] or instant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParameter {
    pub key: String,
    pub value: serde_json::Value,
}

impl ActionParameter {
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
