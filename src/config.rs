// Loop rates, topics, bus wiring and control constants
use std::time::Duration;

// Wakeup (control tick) frequency
pub const LOOP_HZ: u64 = 50;

// Housekeeping telemetry frequency
pub const HK_HZ: u64 = 1;

// Zenoh topics
pub const TOPIC_CMD: &str = "romi/cmd"; // commands
pub const TOPIC_HK: &str = "romi/tlm/hk"; // housekeeping counters
pub const TOPIC_STATE: &str = "romi/tlm/state"; // per-tick motor state

// I2C wiring
// The Romi 32u4 control board hangs off the Pi's bus 1
pub const I2C_BUS_NUMBER: u8 = 1;
pub const ROMI_ADDRESS: u16 = 0x14;

/// Wait between the register-address write and the data read.
/// The 32u4 firmware needs this to load the requested register; it is not a tunable.
pub const SETTLE_DELAY: Duration = Duration::from_micros(100);

// Control law
pub const PROPORTIONAL_GAIN: f32 = 0.05;
pub const MAX_POWER: i16 = 200;

// Parameter table
pub const TABLE_PATH: &str = "romi_table.json";
pub const TABLE_PATH_ENV: &str = "ROMI_TABLE";

/// Device node for the configured bus, e.g. `/dev/i2c-1`
pub fn i2c_device_path() -> String {
    format!("/dev/i2c-{}", I2C_BUS_NUMBER)
}
