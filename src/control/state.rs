// Persistent control state: odometry, targets, power and counters

use tracing::debug;

use super::law::{advance_step_target, proportional_power};
use crate::messages::{Housekeeping, MotorState};
use crate::motor::EncoderPair;

/// Command and bus counters. They only go back to zero on an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub cmd: u32,
    pub err: u32,
    pub i2c_errors: u32,
}

impl Counters {
    pub fn count_command(&mut self) {
        self.cmd = self.cmd.wrapping_add(1);
    }

    pub fn count_error(&mut self) {
        self.err = self.err.wrapping_add(1);
    }

    pub fn count_i2c_error(&mut self) {
        self.i2c_errors = self.i2c_errors.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything the tick and the command handlers share.
///
/// Odometers accumulate plain `i16` encoder deltas. A delta is only right if
/// the wheel moved less than 32767 counts since the previous successful read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlState {
    pub motors_enabled: bool,

    pub raw_left_encoder: i16,
    pub raw_right_encoder: i16,
    pub left_encoder_delta: i16,
    pub right_encoder_delta: i16,

    pub left_odometer: i32,
    pub right_odometer: i32,

    pub left_step_target: i32,
    pub right_step_target: i32,
    pub left_target: i32,
    pub right_target: i32,
    pub target_delta_left: i16,
    pub target_delta_right: i16,

    pub left_power: i16,
    pub right_power: i16,

    pub battery_millivolts: u16,
    pub counters: Counters,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a fresh encoder reading into the deltas and odometers
    pub fn apply_encoders(&mut self, encoders: EncoderPair) {
        self.left_encoder_delta = encoders.left.wrapping_sub(self.raw_left_encoder);
        self.right_encoder_delta = encoders.right.wrapping_sub(self.raw_right_encoder);
        self.raw_left_encoder = encoders.left;
        self.raw_right_encoder = encoders.right;
        self.left_odometer = self
            .left_odometer
            .wrapping_add(i32::from(self.left_encoder_delta));
        self.right_odometer = self
            .right_odometer
            .wrapping_add(i32::from(self.right_encoder_delta));
    }

    /// Advance both step targets and compute the next power pair
    pub fn step_control(&mut self) -> (i16, i16) {
        self.left_step_target = advance_step_target(
            self.left_step_target,
            self.left_target,
            self.target_delta_left,
        );
        self.right_step_target = advance_step_target(
            self.right_step_target,
            self.right_target,
            self.target_delta_right,
        );

        self.left_power = proportional_power(self.left_step_target, self.left_odometer);
        self.right_power = proportional_power(self.right_step_target, self.right_odometer);

        debug!(
            "Motor set L: {} {} {}, R: {} {} {}",
            self.left_power,
            self.left_step_target,
            self.left_target,
            self.right_power,
            self.right_step_target,
            self.right_target
        );

        (self.left_power, self.right_power)
    }

    /// Record that the wheels were commanded to stop
    pub fn stop(&mut self) -> (i16, i16) {
        self.left_power = 0;
        self.right_power = 0;
        (0, 0)
    }

    pub fn motor_state(&self) -> MotorState {
        MotorState {
            motors_enabled: self.motors_enabled,
            left_power: self.left_power,
            right_power: self.right_power,
            left_encoder_delta: self.left_encoder_delta,
            right_encoder_delta: self.right_encoder_delta,
            left_odometer: self.left_odometer,
            right_odometer: self.right_odometer,
        }
    }

    pub fn housekeeping(&self) -> Housekeeping {
        Housekeeping {
            cmd_counter: self.counters.cmd,
            err_counter: self.counters.err,
            i2c_error_counter: self.counters.i2c_errors,
            motors_enabled: self.motors_enabled,
            battery_millivolts: self.battery_millivolts,
            raw_left_encoder: self.raw_left_encoder,
            raw_right_encoder: self.raw_right_encoder,
            left_odometer: self.left_odometer,
            right_odometer: self.right_odometer,
        }
    }
}
