// Linux i2c-dev bus
//
// The device node is opened once through linux-embedded-hal. Every transfer
// after that carries the target address itself, so binding a target is only a
// check that the address fits the 7-bit range the board answers on.

use linux_embedded_hal::I2cdev;
use tracing::{debug, info};

/// Errors raised while bringing the bus up
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Failed to open I2C device {path}: {source}")]
    DeviceOpenFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to select I2C device address 0x{address:02X}: not a 7-bit address")]
    AddressSelectFailed { address: u16 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Open the bus device node for bidirectional access
pub fn open(path: &str) -> Result<I2cdev> {
    let bus = I2cdev::new(path).map_err(|e| BusError::DeviceOpenFailed {
        path: path.to_string(),
        source: e.into(),
    })?;

    info!("Opened I2C bus {}", path);
    Ok(bus)
}

/// Resolve the address subsequent transfers are sent to
pub fn select_target(address: u16) -> Result<u8> {
    let address = u8::try_from(address)
        .ok()
        .filter(|a| *a <= 0x7F)
        .ok_or(BusError::AddressSelectFailed { address })?;

    debug!("Selected address 0x{:02X}", address);
    Ok(address)
}
