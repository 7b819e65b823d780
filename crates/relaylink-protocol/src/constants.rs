//! Protocol constants
//!
//! These constants define the frame delimiters, command codes, field widths,
//! and other fixed values of the slave controller wire protocol.

// ============================================================================
// Frame Delimiters and Escaping
// ============================================================================

/// Start-of-packet delimiter.
pub const SOP: u8 = 0xE1;
/// End-of-packet delimiter.
pub const EOP: u8 = 0xE2;
/// Escape byte. Doubled to represent itself inside frame content.
pub const ESC: u8 = 0xFF;
/// Second byte of the escape pair standing in for a literal SOP.
pub const ESCAPED_SOP: u8 = 0x1E;
/// Second byte of the escape pair standing in for a literal EOP.
pub const ESCAPED_EOP: u8 = 0x1D;

// ============================================================================
// Acknowledge Codes (slave → master)
// ============================================================================

/// Command accepted.
pub const ACK: u8 = 0x00;
/// Command rejected.
pub const NAK: u8 = 0x01;

// ============================================================================
// Command Codes (master → slave)
// ============================================================================

/// Pulse an output line (first-generation firmware).
pub const CMD_SET_OUTPUT: u8 = 0;
/// Set the operating mode (second-generation firmware, stored in EEPROM).
pub const CMD_SET_MODE: u8 = 0;
/// Request an immediate input status report.
pub const CMD_FORCE_UPDATE: u8 = 1;
/// Program a new slave address (stored in EEPROM).
pub const CMD_SET_SLAVE_ID: u8 = 2;
/// Select a new serial speed by index (stored in EEPROM).
pub const CMD_SET_SPEED: u8 = 3;
/// Set the key configuration bitmask (second-generation, stored in EEPROM).
pub const CMD_SET_CONFIG_BITS: u8 = 4;
/// Run a timed key sequence (second-generation, not stored).
pub const CMD_EXECUTE_SEQUENCE: u8 = 5;

// ============================================================================
// Key Configuration Bits (second-generation firmware)
// ============================================================================

/// Disable the internal beeper.
pub const CONFIG_BEEPER_DISABLE: u8 = 0x01;
/// Disable the internal keyboard.
pub const CONFIG_KEYBOARD_DISABLE: u8 = 0x02;
/// Drive the relay output.
pub const CONFIG_RELAY: u8 = 0x04;
/// Simulate key activation.
pub const CONFIG_KEY_ACTIVATION: u8 = 0x08;
/// Bits 4..=7 are reserved and must be zero.
pub const CONFIG_RESERVED_MASK: u8 = 0xF0;

// ============================================================================
// Field Widths
// ============================================================================

/// Width of the length field in bytes.
pub const LENGTH_FIELD_SIZE: usize = 2;
/// Width of the slave-id field in bytes.
pub const SLAVE_ID_FIELD_SIZE: usize = 2;
/// Width of the CRC field in bytes.
pub const CRC_FIELD_SIZE: usize = 2;
/// Byte count the length field adds on top of the command payload: the
/// length, slave-id, and CRC fields themselves.
pub const FRAME_OVERHEAD: usize = LENGTH_FIELD_SIZE + SLAVE_ID_FIELD_SIZE + CRC_FIELD_SIZE;
/// Value of the length field in every response frame: ack + status plus
/// [`FRAME_OVERHEAD`].
pub const RESPONSE_LENGTH: u16 = (2 + FRAME_OVERHEAD) as u16;

// ============================================================================
// Limits
// ============================================================================

/// Number of digital input lines reported in the status bitmask.
pub const INPUT_LINE_COUNT: usize = 8;
/// Longest key sequence accepted by `CMD_EXECUTE_SEQUENCE`.
pub const MAX_SEQUENCE_LEN: usize = 64;

// ============================================================================
// Serial Speeds
// ============================================================================

/// Baud rates the slave supports, indexed by the `CMD_SET_SPEED` argument.
pub const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

// ============================================================================
// CRC
// ============================================================================

/// Multiplier of the nibble-wise CRC-16 step, derived from polynomial 0x1021.
pub const CRC_MULTIPLIER: u16 = 4225;
