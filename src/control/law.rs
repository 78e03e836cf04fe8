// Rate-limited step target and proportional power law
//
// Both functions are per-wheel and pure; the tick applies them to each side
// independently.

use crate::config::{MAX_POWER, PROPORTIONAL_GAIN};

/// Move `step` toward `target` by at most `delta`.
///
/// When the remaining distance is within `delta` the step snaps onto the
/// target exactly. Direction ties (distance 0) resolve toward positive.
/// A negative `delta` is not rejected and pushes the step away from the
/// target; callers own the sign of the rate limit. A step pushed past the
/// `i32` range pins at the bound instead of wrapping.
pub fn advance_step_target(step: i32, target: i32, delta: i16) -> i32 {
    let distance = i64::from(target) - i64::from(step);
    let direction: i64 = if distance >= 0 { 1 } else { -1 };
    let delta = i64::from(delta);

    if distance * direction > delta {
        let next = i64::from(step) + delta * direction;
        i32::try_from(next).unwrap_or(if next < 0 { i32::MIN } else { i32::MAX })
    } else {
        target
    }
}

/// Power command for one wheel, saturated to `[-MAX_POWER, MAX_POWER]`
pub fn proportional_power(step_target: i32, odometer: i32) -> i16 {
    let error = i64::from(step_target) - i64::from(odometer);
    let power = PROPORTIONAL_GAIN * error as f32;
    // `as` truncates toward zero, matching the board's integer power units
    power.clamp(-f32::from(MAX_POWER), f32::from(MAX_POWER)) as i16
}
