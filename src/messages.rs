// Message types for the runtime

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command from ground/teleop -> runtime
///
/// Wire form is JSON tagged by `"cmd"`, e.g.
/// `{"cmd": "set_target", "left": 100, "right": 100}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Noop,
    ResetCounters,
    Process,
    Enable,
    Disable,
    /// Add to the current odometer targets
    #[serde(rename = "set_target")]
    SetTargetRelative { left: i16, right: i16 },
    /// Replace the odometer targets
    SetTargetAbsolute { left: i16, right: i16 },
    /// Replace the per-tick step limits
    SetTargetDelta { left: i16, right: i16 },
}

const UNIT_FIELDS: &[&str] = &["cmd"];
const PAIR_FIELDS: &[&str] = &["cmd", "left", "right"];

/// Command names and their fixed payload fields
const COMMANDS: &[(&str, &[&str])] = &[
    ("noop", UNIT_FIELDS),
    ("reset_counters", UNIT_FIELDS),
    ("process", UNIT_FIELDS),
    ("enable", UNIT_FIELDS),
    ("disable", UNIT_FIELDS),
    ("set_target", PAIR_FIELDS),
    ("set_target_absolute", PAIR_FIELDS),
    ("set_target_delta", PAIR_FIELDS),
];

/// Rejections raised before a command reaches its handler
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid payload for {command}: {reason}")]
    CommandLengthMismatch { command: String, reason: String },
}

impl Command {
    /// Decode a command, checking the name and payload shape first
    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| CommandError::Malformed(e.to_string()))?;

        let Some(object) = value.as_object() else {
            return Err(CommandError::Malformed("expected a JSON object".to_string()));
        };
        let Some(name) = object.get("cmd").and_then(Value::as_str) else {
            return Err(CommandError::Malformed("missing \"cmd\" field".to_string()));
        };
        let Some((_, fields)) = COMMANDS.iter().find(|(n, _)| *n == name) else {
            return Err(CommandError::UnknownCommand(name.to_string()));
        };

        let shape_ok =
            object.len() == fields.len() && fields.iter().all(|f| object.contains_key(*f));
        if !shape_ok {
            let mut got: Vec<&str> = object.keys().map(String::as_str).collect();
            got.sort_unstable();
            return Err(CommandError::CommandLengthMismatch {
                command: name.to_string(),
                reason: format!("expected fields {:?}, got {:?}", fields, got),
            });
        }

        let name = name.to_string();
        serde_json::from_value(value).map_err(|e| CommandError::CommandLengthMismatch {
            command: name,
            reason: e.to_string(),
        })
    }

    /// Commands that need the bus open before they are applied
    pub fn needs_hardware(&self) -> bool {
        !matches!(
            self,
            Command::Noop | Command::ResetCounters | Command::Process
        )
    }
}

/// Housekeeping telemetry, published on a fixed cadence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Housekeeping {
    pub cmd_counter: u32,
    pub err_counter: u32,
    pub i2c_error_counter: u32,
    pub motors_enabled: bool,
    pub battery_millivolts: u16,
    pub raw_left_encoder: i16,
    pub raw_right_encoder: i16,
    pub left_odometer: i32,
    pub right_odometer: i32,
}

/// Live motor state, published once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorState {
    pub motors_enabled: bool,
    pub left_power: i16,
    pub right_power: i16,
    pub left_encoder_delta: i16,
    pub right_encoder_delta: i16,
    pub left_odometer: i32,
    pub right_odometer: i32,
}
