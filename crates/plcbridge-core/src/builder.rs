//! Order and instant-action construction.
//!
//! A direct action is a single-node, single-action order: the node sits at
//! the map origin, is released immediately, and carries one non-blocking
//! action whose parameters name what the robot should run.

use plcbridge_types::{
    Action, ActionParameter, BlockingType, BridgeError, InstantAction, InstantActions, Node,
    NodePosition, Order,
};

use crate::command::ParsedCommand;
use crate::ids::OrderIds;
use crate::settings::BridgeSettings;

/// Build the order for a direct-action command.
///
/// `orderUpdateId` is always 0: every direct action is a fresh order that is
/// never amended.
///
/// # Errors
///
/// [`BridgeError::UnsupportedCommandType`] when `command` is a cancel, and the
/// classifier's error when it is invalid; neither can be turned into an order.
pub fn build_order(
    command: &ParsedCommand,
    header_id: i64,
    ids: &OrderIds,
    settings: &BridgeSettings,
) -> Result<Order, BridgeError> {
    let (action_type, parameters) = match command {
        ParsedCommand::Inference { base } => (
            &settings.inference_action_type,
            vec![ActionParameter::new("inference_name", base.as_str())],
        ),
        ParsedCommand::Trajectory { base, arm } => (
            &settings.trajectory_action_type,
            vec![
                ActionParameter::new("trajectory_name", base.as_str()),
                ActionParameter::new("arm", arm.as_str()),
            ],
        ),
        ParsedCommand::Cancel { .. } => return Err(BridgeError::UnsupportedCommandType('C')),
        ParsedCommand::Invalid { error, .. } => return Err(error.clone()),
    };
    let base = command.base();

    let action = Action {
        action_type: action_type.clone(),
        action_id: ids.action_id.clone(),
        action_description: Some(format!("Execute {action_type} for {base}")),
        blocking_type: BlockingType::None,
        action_parameters: parameters,
    };

    let node = Node {
        node_id: ids.node_id.clone(),
        sequence_id: 1,
        node_description: Some(format!("Direct action for command {base}")),
        released: true,
        node_position: Some(NodePosition::origin()),
        actions: vec![action],
    };

    let mut order = Order::new(
        header_id,
        &settings.manufacturer,
        &settings.serial_number,
        &ids.order_id,
        0,
    );
    order.nodes.push(node);
    Ok(order)
}

/// Build the `cancelOrder` instant action addressed to the configured robot.
pub fn build_cancel(header_id: i64, action_id: &str, settings: &BridgeSettings) -> InstantActions {
    let mut message = InstantActions::new(header_id, &settings.manufacturer, &settings.serial_number);
    message.actions.push(InstantAction::cancel_order(action_id));
    message
}
