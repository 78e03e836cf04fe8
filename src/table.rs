// Tunable parameter table
//
// Two demonstration integers loaded once at startup. They are read by the
// Process command only and never feed the control law.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{TABLE_PATH, TABLE_PATH_ENV};

/// Upper bound accepted for `param1`
pub const PARAM1_MAX: i32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to read table file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse table file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("param1 out of range: {value} > {max}")]
    OutOfRange { value: i32, max: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamTable {
    pub param1: i32,
    pub param2: i32,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self {
            param1: 1,
            param2: 2,
        }
    }
}

impl ParamTable {
    pub fn from_json(data: &str) -> Result<Self, TableError> {
        let table: ParamTable = serde_json::from_str(data)?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Load the table, falling back to the built-in defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                info!("Loaded parameter table from {}", path.display());
                table
            }
            Err(e) => {
                warn!(
                    "Using default parameter table ({}: {})",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.param1 > PARAM1_MAX {
            return Err(TableError::OutOfRange {
                value: self.param1,
                max: PARAM1_MAX,
            });
        }
        Ok(())
    }

    /// CRC-16/CCITT-FALSE over both parameters, little-endian
    pub fn checksum(&self) -> u16 {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.param1.to_le_bytes());
        bytes[4..].copy_from_slice(&self.param2.to_le_bytes());
        crc16_ccitt_false(&bytes)
    }
}

/// Table location: `$ROMI_TABLE` if set, else the default file name
pub fn table_path() -> String {
    std::env::var(TABLE_PATH_ENV).unwrap_or_else(|_| TABLE_PATH.to_string())
}

fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
