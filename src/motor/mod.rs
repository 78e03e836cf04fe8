// Motor control module for the Romi differential-drive base
//
// Provides:
// - Linux i2c-dev bus bring-up
// - Romi 32u4 register protocol over any embedded-hal I2C bus
// - Typed driver API and the device failure policy

mod driver;
pub mod i2c;
pub mod romi;

pub use driver::{RomiDriver, check_transaction, diagnostic_message};
pub use i2c::BusError;
pub use romi::{DeviceError, EncoderPair, Register, RomiBus};
