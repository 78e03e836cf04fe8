// High-level driver for the Romi control board
//
// Typed wrappers over the register protocol plus the shared policy for
// device failures: count it, report it, carry on.

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use tracing::{error, info, warn};

use super::i2c::{self, BusError};
use super::romi::{DeviceError, EncoderPair, Register, RomiBus};

/// Operator-facing text for each device failure kind
pub fn diagnostic_message(err: DeviceError) -> String {
    match err {
        DeviceError::SetupWriteFailed => "I2C setup write operation failed".to_string(),
        DeviceError::DataReadFailed => "I2C data read operation failed".to_string(),
        DeviceError::DataWriteFailed => "I2C data write operation failed".to_string(),
        DeviceError::OtherIoFailure(kind) => {
            format!("I2C [unknown] operation failed: {:?}", kind)
        }
    }
}

/// Apply the device failure policy to one transaction result.
///
/// On failure the I2C error counter is bumped and the failure is reported
/// once; the caller gets `None` and keeps going with stale data.
pub fn check_transaction<T>(
    result: Result<T, DeviceError>,
    i2c_errors: &mut u32,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            *i2c_errors = i2c_errors.wrapping_add(1);
            error!("{}", diagnostic_message(e));
            None
        }
    }
}

/// Typed access to the Romi board
pub struct RomiDriver<I: I2c> {
    bus: RomiBus<I>,
}

impl RomiDriver<I2cdev> {
    /// Open the bus device and bind it to the board's address
    pub fn connect(path: &str, address: u16) -> Result<Self, BusError> {
        info!("Opening Romi board at 0x{:02X} on {}", address, path);
        let bus = i2c::open(path)?;
        let address = i2c::select_target(address)?;
        Ok(Self::new(bus, address))
    }
}

impl<I: I2c> RomiDriver<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            bus: RomiBus::new(i2c, address),
        }
    }

    /// Raw state of the first button (non-zero = pressed)
    pub fn read_buttons(&mut self) -> Result<u8, DeviceError> {
        let buf = self.bus.read_register(Register::Buttons)?;
        Ok(buf[0])
    }

    pub fn read_battery_millivolts(&mut self) -> Result<u16, DeviceError> {
        let buf = self.bus.read_register(Register::BatteryMillivolts)?;
        Ok(u16::from_le_bytes([buf[0], buf[1]]))
    }

    pub fn read_encoders(&mut self) -> Result<EncoderPair, DeviceError> {
        self.bus.encoder_read()
    }

    /// Command motor power (left, right)
    pub fn write_motors(&mut self, left: i16, right: i16) -> Result<(), DeviceError> {
        self.bus.motor_write(left, right)
    }

    /// Command zero power on both wheels
    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.write_motors(0, 0)
    }
}

impl<I: I2c> Drop for RomiDriver<I> {
    fn drop(&mut self) {
        // Leave the wheels unpowered when the process lets go of the bus
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", diagnostic_message(e));
        }
    }
}
