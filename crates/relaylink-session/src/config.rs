//! Session configuration.

use relaylink_protocol::{Profile, BAUD_RATES};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Configuration for one slave session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port name. `None` means the caller will pick one later.
    pub port: Option<String>,
    /// Baud rate; must be one of [`BAUD_RATES`].
    pub baud: u32,
    /// Addressing slave id. Kept as a wider integer so an out-of-range
    /// value in a config file is rejected by [`SessionConfig::validate`]
    /// instead of silently wrapping.
    pub slave_id: u32,
    /// Firmware command-set profile of the target device.
    pub profile: Profile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: None,
            baud: BAUD_RATES[BAUD_RATES.len() - 1],
            slave_id: 0,
            profile: Profile::A,
        }
    }
}

impl SessionConfig {
    /// Check ranges before the configuration reaches any I/O.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !BAUD_RATES.contains(&self.baud) {
            return Err(SessionError::UnsupportedBaud(self.baud));
        }
        if self.slave_id > u32::from(u16::MAX) {
            return Err(SessionError::InvalidSlaveId);
        }
        Ok(())
    }

    /// The validated 16-bit slave id.
    pub fn slave_id(&self) -> Option<u16> {
        u16::try_from(self.slave_id).ok()
    }
}
