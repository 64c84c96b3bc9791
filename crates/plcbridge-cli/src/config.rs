//! Configuration Vault – reads `~/.plcbridge/config.toml`.
//!
//! Every field is optional; missing fields take their defaults, and
//! `PLCBRIDGE_*` environment variables override whatever the file says.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use plcbridge_core::BridgeSettings;
use plcbridge_middleware::MqttSettings;

/// Where the bridge exchanges messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// An MQTT broker shared with the PLC and the robot fleet.
    #[default]
    Mqtt,
    /// The in-process bus, reachable only through the WebSocket gateway.
    Local,
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Ok(Self::Mqtt),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown transport {other:?}")),
        }
    }
}

/// Persisted bridge configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportKind,

    /// `tcp://host:port` of the MQTT broker.
    #[serde(default = "default_mqtt_broker")]
    pub mqtt_broker: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt_password: Option<String>,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// Topic the PLC publishes commands on.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Topic the bridge answers the PLC on.
    #[serde(default = "default_response_topic")]
    pub response_topic: String,

    /// Leading topic levels for robot traffic.
    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: String,

    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    #[serde(default = "default_serial_number")]
    pub serial_number: String,

    #[serde(default = "default_inference_action_type")]
    pub inference_action_type: String,

    #[serde(default = "default_trajectory_action_type")]
    pub trajectory_action_type: String,

    /// WebSocket port of the bus gateway (local transport only).
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// Fail and forget orders without a terminal report after this many
    /// seconds. Absent or `0` disables eviction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ttl_secs: Option<u64>,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_mqtt_broker() -> String {
    "tcp://localhost:1883".to_string()
}
fn default_mqtt_client_id() -> String {
    "DEX0002_DIRECT_BRIDGE".to_string()
}
fn default_mqtt_keep_alive_secs() -> u64 {
    60
}
fn default_command_topic() -> String {
    "bridge/command".to_string()
}
fn default_response_topic() -> String {
    "bridge/response".to_string()
}
fn default_interface_prefix() -> String {
    "meili/v2".to_string()
}
fn default_manufacturer() -> String {
    "Roboligent".to_string()
}
fn default_serial_number() -> String {
    "DEX0002".to_string()
}
fn default_inference_action_type() -> String {
    "Roboligent Robin - Inference".to_string()
}
fn default_trajectory_action_type() -> String {
    "Roboligent Robin - Follow Trajectory".to_string()
}
fn default_gateway_port() -> u16 {
    9090
}
fn default_sweep_interval_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            mqtt_broker: default_mqtt_broker(),
            mqtt_client_id: default_mqtt_client_id(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keep_alive_secs: default_mqtt_keep_alive_secs(),
            command_topic: default_command_topic(),
            response_topic: default_response_topic(),
            interface_prefix: default_interface_prefix(),
            manufacturer: default_manufacturer(),
            serial_number: default_serial_number(),
            inference_action_type: default_inference_action_type(),
            trajectory_action_type: default_trajectory_action_type(),
            gateway_port: default_gateway_port(),
            order_ttl_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("transport", &self.transport)
            .field("mqtt_broker", &self.mqtt_broker)
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("mqtt_username", &self.mqtt_username)
            .field(
                "mqtt_password",
                if self.mqtt_password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("mqtt_keep_alive_secs", &self.mqtt_keep_alive_secs)
            .field("command_topic", &self.command_topic)
            .field("response_topic", &self.response_topic)
            .field("interface_prefix", &self.interface_prefix)
            .field("manufacturer", &self.manufacturer)
            .field("serial_number", &self.serial_number)
            .field("inference_action_type", &self.inference_action_type)
            .field("trajectory_action_type", &self.trajectory_action_type)
            .field("gateway_port", &self.gateway_port)
            .field("order_ttl_secs", &self.order_ttl_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

impl Config {
    /// Broker connection parameters. Empty credentials count as unset.
    pub fn mqtt_settings(&self) -> MqttSettings {
        MqttSettings {
            broker: self.mqtt_broker.clone(),
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone().filter(|u| !u.is_empty()),
            password: self.mqtt_password.clone().filter(|p| !p.is_empty()),
            keep_alive: Duration::from_secs(self.mqtt_keep_alive_secs),
            ..MqttSettings::default()
        }
    }

    /// Convert into the runtime settings of the bridge.
    ///
    /// A zero TTL disables eviction; the sweep interval is at least one
    /// second.
    pub fn into_settings(self) -> BridgeSettings {
        BridgeSettings {
            command_topic: self.command_topic,
            response_topic: self.response_topic,
            interface_prefix: self.interface_prefix,
            manufacturer: self.manufacturer,
            serial_number: self.serial_number,
            inference_action_type: self.inference_action_type,
            trajectory_action_type: self.trajectory_action_type,
            order_ttl: self
                .order_ttl_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        }
    }
}

/// Return the config path: `PLCBRIDGE_CONFIG` when set, otherwise
/// `~/.plcbridge/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PLCBRIDGE_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".plcbridge").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Defaults with the environment applied, for when no file exists.
pub fn from_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `PLCBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PLCBRIDGE_TRANSPORT` | `transport` (`mqtt` or `local`) |
/// | `PLCBRIDGE_MQTT_BROKER` | `mqtt_broker` |
/// | `PLCBRIDGE_MQTT_CLIENT_ID` | `mqtt_client_id` |
/// | `PLCBRIDGE_MQTT_USERNAME` | `mqtt_username` |
/// | `PLCBRIDGE_MQTT_PASSWORD` | `mqtt_password` |
/// | `PLCBRIDGE_COMMAND_TOPIC` | `command_topic` |
/// | `PLCBRIDGE_RESPONSE_TOPIC` | `response_topic` |
/// | `PLCBRIDGE_INTERFACE_PREFIX` | `interface_prefix` |
/// | `PLCBRIDGE_MANUFACTURER` | `manufacturer` |
/// | `PLCBRIDGE_SERIAL_NUMBER` | `serial_number` |
/// | `PLCBRIDGE_GATEWAY_PORT` | `gateway_port` |
/// | `PLCBRIDGE_ORDER_TTL_SECS` | `order_ttl_secs` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides from `lookup`, keyed by environment variable name.
pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PLCBRIDGE_TRANSPORT")
        && let Ok(kind) = v.parse::<TransportKind>()
    {
        cfg.transport = kind;
    }
    if let Some(v) = lookup("PLCBRIDGE_MQTT_BROKER") {
        cfg.mqtt_broker = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_MQTT_CLIENT_ID") {
        cfg.mqtt_client_id = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_MQTT_USERNAME") {
        cfg.mqtt_username = Some(v);
    }
    if let Some(v) = lookup("PLCBRIDGE_MQTT_PASSWORD") {
        cfg.mqtt_password = Some(v);
    }
    if let Some(v) = lookup("PLCBRIDGE_COMMAND_TOPIC") {
        cfg.command_topic = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_RESPONSE_TOPIC") {
        cfg.response_topic = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_INTERFACE_PREFIX") {
        cfg.interface_prefix = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_MANUFACTURER") {
        cfg.manufacturer = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_SERIAL_NUMBER") {
        cfg.serial_number = v;
    }
    if let Some(v) = lookup("PLCBRIDGE_GATEWAY_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.gateway_port = port;
    }
    if let Some(v) = lookup("PLCBRIDGE_ORDER_TTL_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.order_ttl_secs = Some(secs);
    }
}
