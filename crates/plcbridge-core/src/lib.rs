//! `plcbridge-core` – PLC ⇄ robot order lifecycle
//!
//! Translates terse PLC commands into robot orders and instant actions,
//! tracks what is in flight, and answers the PLC with one status letter per
//! robot state report.
//!
//! # Modules
//!
//! - [`command`] – [`classify`][command::classify]: turns `BASE:I`,
//!   `BASE:T[:ARM]` and `BASE:C` into a [`ParsedCommand`].
//! - [`ids`] – [`IdGenerator`]: strictly increasing hybrid-clock identifiers
//!   for orders, nodes and actions.
//! - [`builder`] – single-node orders and `cancelOrder` instant actions.
//! - [`aggregator`] – reduction of per-action statuses to one
//!   [`PlcStatus`][plcbridge_types::PlcStatus], with separate policies for
//!   active and canceled orders.
//! - [`tracker`] – [`CorrelationTracker`]: the active and canceled maps plus
//!   the shared header counter, behind one lock.
//! - [`response`] – [`ResponseEmitter`]: publishes `BASE:LETTER`.
//! - [`bridge`] – [`Bridge`]: wires the pieces together for one PLC and one
//!   robot.
//! - [`service`] – [`BridgeService`]: runs a [`Bridge`] against a
//!   [`Transport`][plcbridge_middleware::Transport] until shutdown.

pub mod aggregator;
pub mod bridge;
pub mod builder;
pub mod command;
pub mod ids;
pub mod response;
pub mod service;
pub mod settings;
pub mod tracker;

pub use aggregator::Lane;
pub use bridge::{Bridge, CommandOutcome};
pub use command::{ArmSide, ParsedCommand};
pub use ids::{IdGenerator, OrderIds};
pub use response::ResponseEmitter;
pub use service::BridgeService;
pub use settings::BridgeSettings;
pub use tracker::{CorrelationTracker, Eviction, Settlement, TrackerSnapshot};
