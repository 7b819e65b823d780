//! Commands that can be sent to the slave controller.
//!
//! Two firmware generations share the wire format but expose different
//! command tables. Codes 0..=3 exist on both; code 0 changes meaning between
//! generations, and codes 4..=5 exist only on the second generation. Which
//! table applies is a property of the session, chosen at construction via
//! [`Profile`].

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ProtocolError;

/// Command-set profile of the target firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// First-generation output/relay controller: `SetOutput`, `ForceUpdate`,
    /// `SetSlaveId`, `SetSpeedIndex`.
    A,
    /// Second-generation keyboard controller: `SetMode`, `ForceUpdate`,
    /// `SetSlaveId`, `SetSpeedIndex`, `SetConfigBits`, `ExecuteSequence`.
    B,
}

/// Commands understood by the slave controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pulse an output line (profile A).
    SetOutput {
        /// Output line number.
        name: u8,
        /// On time, in 5 ms units.
        ton: u8,
        /// Off time, in 5 ms units.
        toff: u8,
        /// Number of pulses to emit.
        pulse_count: u8,
    },

    /// Set the operating mode (profile B, stored in EEPROM).
    SetMode {
        /// Mode flag.
        enabled: bool,
    },

    /// Request an immediate input status report.
    ForceUpdate,

    /// Program a new slave address (stored in EEPROM).
    SetSlaveId {
        /// The new 16-bit address.
        id: u16,
    },

    /// Select a new serial speed (stored in EEPROM).
    SetSpeedIndex {
        /// Index into [`BAUD_RATES`].
        index: u8,
    },

    /// Set the key configuration bitmask (profile B, stored in EEPROM).
    SetConfigBits {
        /// Combination of the `CONFIG_*` bits.
        bits: u8,
    },

    /// Run a timed key sequence (profile B, not stored).
    ExecuteSequence {
        /// Key configuration applied for the duration of the sequence.
        config_bits: u8,
        /// Key press time per step, in 5 ms units.
        ton: u8,
        /// Key release time per step, in 5 ms units.
        toff: u8,
        /// Key states, one bit per key, one byte per step.
        sequence: Vec<u8>,
    },
}

impl Command {
    /// Wire code of this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::SetOutput { .. } => CMD_SET_OUTPUT,
            Command::SetMode { .. } => CMD_SET_MODE,
            Command::ForceUpdate => CMD_FORCE_UPDATE,
            Command::SetSlaveId { .. } => CMD_SET_SLAVE_ID,
            Command::SetSpeedIndex { .. } => CMD_SET_SPEED,
            Command::SetConfigBits { .. } => CMD_SET_CONFIG_BITS,
            Command::ExecuteSequence { .. } => CMD_EXECUTE_SEQUENCE,
        }
    }

    /// Whether the given firmware profile understands this command.
    pub fn supported_by(&self, profile: Profile) -> bool {
        match self {
            Command::SetOutput { .. } => profile == Profile::A,
            Command::SetMode { .. }
            | Command::SetConfigBits { .. }
            | Command::ExecuteSequence { .. } => profile == Profile::B,
            Command::ForceUpdate | Command::SetSlaveId { .. } | Command::SetSpeedIndex { .. } => {
                true
            }
        }
    }

    /// Check argument ranges before any encoding or I/O happens.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Command::SetSpeedIndex { index } => {
                if usize::from(*index) >= BAUD_RATES.len() {
                    return Err(ProtocolError::InvalidArgument {
                        field: "index",
                        reason: format!("speed index {} out of range", index),
                    });
                }
            }
            Command::SetConfigBits { bits } => {
                if bits & CONFIG_RESERVED_MASK != 0 {
                    return Err(ProtocolError::InvalidArgument {
                        field: "bits",
                        reason: format!("reserved bits set in 0x{:02X}", bits),
                    });
                }
            }
            Command::ExecuteSequence {
                config_bits,
                ton,
                toff,
                sequence,
            } => {
                if config_bits & CONFIG_RESERVED_MASK != 0 {
                    return Err(ProtocolError::InvalidArgument {
                        field: "config_bits",
                        reason: format!("reserved bits set in 0x{:02X}", config_bits),
                    });
                }
                if *ton == 0 {
                    return Err(ProtocolError::InvalidArgument {
                        field: "ton",
                        reason: "press time must be at least 1".to_string(),
                    });
                }
                if *toff == 0 {
                    return Err(ProtocolError::InvalidArgument {
                        field: "toff",
                        reason: "release time must be at least 1".to_string(),
                    });
                }
                if sequence.is_empty() || sequence.len() > MAX_SEQUENCE_LEN {
                    return Err(ProtocolError::InvalidArgument {
                        field: "sequence",
                        reason: format!(
                            "sequence length {} outside 1..={}",
                            sequence.len(),
                            MAX_SEQUENCE_LEN
                        ),
                    });
                }
            }
            Command::SetOutput { .. }
            | Command::SetMode { .. }
            | Command::ForceUpdate
            | Command::SetSlaveId { .. } => {}
        }
        Ok(())
    }

    /// Append the argument bytes to `buf`, in wire order.
    pub fn encode_args(&self, buf: &mut Vec<u8>) {
        match self {
            Command::SetOutput {
                name,
                ton,
                toff,
                pulse_count,
            } => {
                buf.push(*name);
                buf.push(*ton);
                buf.push(*toff);
                buf.push(*pulse_count);
            }
            Command::SetMode { enabled } => {
                buf.push(u8::from(*enabled));
            }
            Command::ForceUpdate => {}
            Command::SetSlaveId { id } => {
                buf.extend_from_slice(&id.to_le_bytes());
            }
            Command::SetSpeedIndex { index } => {
                buf.push(*index);
            }
            Command::SetConfigBits { bits } => {
                buf.push(*bits);
            }
            Command::ExecuteSequence {
                config_bits,
                ton,
                toff,
                sequence,
            } => {
                buf.push(*config_bits);
                buf.push(*ton);
                buf.push(*toff);
                buf.push(sequence.len() as u8);
                buf.extend_from_slice(sequence);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<u8> {
        let mut buf = Vec::new();
        command.encode_args(&mut buf);
        buf
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::SetOutput { name: 0, ton: 1, toff: 1, pulse_count: 1 }.code(), 0);
        assert_eq!(Command::SetMode { enabled: true }.code(), 0);
        assert_eq!(Command::ForceUpdate.code(), 1);
        assert_eq!(Command::SetSlaveId { id: 7 }.code(), 2);
        assert_eq!(Command::SetSpeedIndex { index: 0 }.code(), 3);
        assert_eq!(Command::SetConfigBits { bits: 0 }.code(), 4);
        assert_eq!(
            Command::ExecuteSequence {
                config_bits: 0,
                ton: 1,
                toff: 1,
                sequence: vec![0x01],
            }
            .code(),
            5
        );
    }

    #[test]
    fn test_encode_set_output() {
        let cmd = Command::SetOutput {
            name: 3,
            ton: 20,
            toff: 20,
            pulse_count: 1,
        };
        assert_eq!(args(&cmd), vec![3, 20, 20, 1]);
    }

    #[test]
    fn test_encode_set_slave_id_little_endian() {
        let cmd = Command::SetSlaveId { id: 0x1234 };
        assert_eq!(args(&cmd), vec![0x34, 0x12]);
    }

    #[test]
    fn test_encode_execute_sequence_prefixes_length() {
        let cmd = Command::ExecuteSequence {
            config_bits: CONFIG_RELAY,
            ton: 10,
            toff: 5,
            sequence: vec![0x01, 0x80, 0xFF],
        };
        assert_eq!(args(&cmd), vec![CONFIG_RELAY, 10, 5, 3, 0x01, 0x80, 0xFF]);
    }

    #[test]
    fn test_profile_gating() {
        let set_output = Command::SetOutput { name: 0, ton: 1, toff: 1, pulse_count: 1 };
        assert!(set_output.supported_by(Profile::A));
        assert!(!set_output.supported_by(Profile::B));

        let set_mode = Command::SetMode { enabled: false };
        assert!(!set_mode.supported_by(Profile::A));
        assert!(set_mode.supported_by(Profile::B));

        assert!(Command::ForceUpdate.supported_by(Profile::A));
        assert!(Command::ForceUpdate.supported_by(Profile::B));
        assert!(Command::SetSpeedIndex { index: 0 }.supported_by(Profile::A));
        assert!(Command::SetConfigBits { bits: 0 }.supported_by(Profile::B));
    }

    #[test]
    fn test_validate_speed_index() {
        assert!(Command::SetSpeedIndex { index: 4 }.validate().is_ok());
        assert!(Command::SetSpeedIndex { index: 5 }.validate().is_err());
    }

    #[test]
    fn test_validate_sequence_limits() {
        let ok = Command::ExecuteSequence {
            config_bits: 0,
            ton: 1,
            toff: 1,
            sequence: vec![0; MAX_SEQUENCE_LEN],
        };
        assert!(ok.validate().is_ok());

        let too_long = Command::ExecuteSequence {
            config_bits: 0,
            ton: 1,
            toff: 1,
            sequence: vec![0; MAX_SEQUENCE_LEN + 1],
        };
        assert!(too_long.validate().is_err());

        let empty = Command::ExecuteSequence {
            config_bits: 0,
            ton: 1,
            toff: 1,
            sequence: Vec::new(),
        };
        assert!(empty.validate().is_err());

        let zero_ton = Command::ExecuteSequence {
            config_bits: 0,
            ton: 0,
            toff: 1,
            sequence: vec![0x01],
        };
        assert!(zero_ton.validate().is_err());
    }

    #[test]
    fn test_validate_reserved_config_bits() {
        assert!(Command::SetConfigBits { bits: 0x0F }.validate().is_ok());
        assert!(Command::SetConfigBits { bits: 0x10 }.validate().is_err());
    }
}
