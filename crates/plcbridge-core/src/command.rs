//! Command classifier.
//!
//! The PLC speaks in short colon-delimited strings:
//!
//! | Command | Meaning |
//! |---|---|
//! | `BASE:I` | run the inference named `BASE` |
//! | `BASE:T` / `BASE:T:R` / `BASE:T:L` | follow trajectory `BASE` with the right or left arm |
//! | `BASE:C` | cancel the in-flight order started by a `BASE:*` command |
//!
//! [`classify`] turns a raw string into a [`ParsedCommand`] once; everything
//! downstream matches on the variant instead of re-inspecting the string.

use plcbridge_types::{BridgeError, base_command};

/// Arm that executes a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    /// Resolve a PLC arm code. Total: `L` is left, anything else (including
    /// the empty string) is right.
    pub fn from_code(code: &str) -> Self {
        match code {
            "L" => ArmSide::Left,
            _ => ArmSide::Right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArmSide::Left => "left",
            ArmSide::Right => "right",
        }
    }
}

/// Classified PLC intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Inference { base: String },
    Trajectory { base: String, arm: ArmSide },
    Cancel { base: String },
    /// Rejected input; `base` is what the Failed response is addressed to.
    Invalid { base: String, error: BridgeError },
}

impl ParsedCommand {
    pub fn base(&self) -> &str {
        match self {
            ParsedCommand::Inference { base }
            | ParsedCommand::Trajectory { base, .. }
            | ParsedCommand::Cancel { base }
            | ParsedCommand::Invalid { base, .. } => base,
        }
    }
}

/// Classify a raw PLC command. Surrounding whitespace is ignored.
///
/// Rules, first match wins:
///
/// 1. ends with `:C` → [`ParsedCommand::Cancel`]
/// 2. ends with `:I` or contains `:T` → direct action; the first character
///    of the second field selects inference (`I`) or trajectory (`T`), the
///    optional third field is the arm code
/// 3. anything else → [`ParsedCommand::Invalid`]
pub fn classify(raw: &str) -> ParsedCommand {
    let command = raw.trim();

    if command.ends_with(":C") {
        return ParsedCommand::Cancel {
            base: base_command(command).to_string(),
        };
    }

    if !(command.ends_with(":I") || command.contains(":T")) {
        return invalid(command, BridgeError::MalformedCommand(command.to_string()));
    }

    let fields: Vec<&str> = command.split(':').collect();
    let (Some(base), Some(kind_field)) = (fields.first(), fields.get(1)) else {
        return invalid(command, BridgeError::MalformedCommand(command.to_string()));
    };
    let Some(kind) = kind_field.chars().next() else {
        return invalid(command, BridgeError::MalformedCommand(command.to_string()));
    };
    let arm_code = fields.get(2).copied().unwrap_or("");

    match direct_action(base, kind, arm_code) {
        Ok(parsed) => parsed,
        Err(error) => invalid(command, error),
    }
}

/// Map a direct-action type character to its variant.
///
/// # Errors
///
/// [`BridgeError::UnsupportedCommandType`] for anything but `I` and `T`.
pub fn direct_action(base: &str, kind: char, arm_code: &str) -> Result<ParsedCommand, BridgeError> {
    match kind {
        'I' => Ok(ParsedCommand::Inference {
            base: base.to_string(),
        }),
        'T' => Ok(ParsedCommand::Trajectory {
            base: base.to_string(),
            arm: ArmSide::from_code(arm_code),
        }),
        other => Err(BridgeError::UnsupportedCommandType(other)),
    }
}

fn invalid(command: &str, error: BridgeError) -> ParsedCommand {
    ParsedCommand::Invalid {
        base: base_command(command).to_string(),
        error,
    }
}
