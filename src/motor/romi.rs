// Romi 32u4 control board protocol
//
// The board exposes an SMBus-like register file:
//   read:  [register] -> settle delay -> N bytes
//   write: [command, payload...] in one block
// Multi-byte values are little-endian.

use std::thread;

use embedded_hal::i2c::{Error, ErrorKind, I2c};
use tracing::debug;

use crate::config::SETTLE_DELAY;

/// Command byte for the motor power block write
pub const CMD_MOTORS: u8 = 6;

/// Readable registers on the Romi board
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Buttons = 3,            // 3 bytes: A, B, C button states
    BatteryMillivolts = 10, // 2 bytes, u16
    Encoders = 39,          // 4 bytes: left i16, right i16
}

impl Register {
    /// Number of bytes the board returns for this register
    pub fn size(self) -> usize {
        match self {
            Register::Buttons => 3,
            Register::BatteryMillivolts => 2,
            Register::Encoders => 4,
        }
    }
}

/// Failure kinds for a device transaction.
///
/// Kept free of any message text; operator-facing wording lives in
/// `driver::diagnostic_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("setup write failed")]
    SetupWriteFailed,

    #[error("data read failed")]
    DataReadFailed,

    #[error("data write failed")]
    DataWriteFailed,

    #[error("I/O failure ({0})")]
    OtherIoFailure(ErrorKind),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Free-running wheel encoder counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderPair {
    pub left: i16,
    pub right: i16,
}

/// Map a bus failure to the device failure for the phase it occurred in.
///
/// Kinds that mean "the transaction did not complete" keep the phase; anything
/// else points at the handle or the kernel rather than the transfer.
fn classify<E: Error>(err: E, phase: DeviceError) -> DeviceError {
    debug!("Bus failure during {}: {:?}", phase, err);
    match err.kind() {
        ErrorKind::Bus
        | ErrorKind::ArbitrationLoss
        | ErrorKind::NoAcknowledge(_)
        | ErrorKind::Overrun => phase,
        other => DeviceError::OtherIoFailure(other),
    }
}

/// Encode the 5-byte motor power block
fn motor_frame(left: i16, right: i16) -> [u8; 5] {
    let l = left.to_le_bytes();
    let r = right.to_le_bytes();
    [CMD_MOTORS, l[0], l[1], r[0], r[1]]
}

/// Protocol framing for one board on an I2C bus
pub struct RomiBus<I: I2c> {
    i2c: I,
    address: u8,
}

impl<I: I2c> RomiBus<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Write the register address, wait out the settle delay, then read `len` bytes.
    ///
    /// The two halves are separate bus transactions. The board needs the pause
    /// to latch the register before it can answer, so this is never a
    /// repeated-start `write_read`.
    pub fn register_read(&mut self, register: u8, len: usize) -> Result<Vec<u8>> {
        self.i2c
            .write(self.address, &[register])
            .map_err(|e| classify(e, DeviceError::SetupWriteFailed))?;

        thread::sleep(SETTLE_DELAY);

        let mut buf = vec![0u8; len];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(|e| classify(e, DeviceError::DataReadFailed))?;
        Ok(buf)
    }

    /// Read a fixed-length register
    pub fn read_register(&mut self, register: Register) -> Result<Vec<u8>> {
        self.register_read(register as u8, register.size())
    }

    /// Read both encoder counters (left, right)
    pub fn encoder_read(&mut self) -> Result<EncoderPair> {
        let buf = self.read_register(Register::Encoders)?;
        Ok(EncoderPair {
            left: i16::from_le_bytes([buf[0], buf[1]]),
            right: i16::from_le_bytes([buf[2], buf[3]]),
        })
    }

    /// Command motor power for both wheels in a single block write
    pub fn motor_write(&mut self, left: i16, right: i16) -> Result<()> {
        self.i2c
            .write(self.address, &motor_frame(left, right))
            .map_err(|e| classify(e, DeviceError::DataWriteFailed))
    }
}
