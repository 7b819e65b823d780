//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding commands or decoding response frames.
///
/// All of these are local to a single frame attempt: the parser resets to
/// its start state and the link stays up. Transport-level failures live one
/// layer up, in the session crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A frame delimiter was not where the wire format requires it.
    #[error("expected delimiter 0x{expected:02X}, got 0x{actual:02X}")]
    FrameSync {
        /// The delimiter that should have been read (SOP or EOP).
        expected: u8,
        /// The byte actually read.
        actual: u8,
    },

    /// The source ran dry before a frame field completed.
    #[error("timed out reading {field}")]
    Truncated {
        /// The field that was being read.
        field: FrameField,
    },

    /// An escape pair's second byte was not a defined substitute.
    #[error("invalid escape sequence: 0xFF 0x{value:02X}")]
    InvalidEscape {
        /// The offending second byte.
        value: u8,
    },

    /// The received CRC did not match the recomputed one.
    #[error("checksum mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        /// CRC recomputed over the decoded fields.
        computed: u16,
        /// CRC carried by the frame.
        received: u16,
    },

    /// The length field does not match the fixed response layout.
    #[error("bad length field: expected {expected}, got {actual}")]
    BadLength {
        /// Length every response frame must carry.
        expected: u16,
        /// Length the frame carried.
        actual: u16,
    },

    /// A caller-supplied command argument is out of range.
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Fields of a response frame, in wire order.
///
/// Used to report where a frame attempt was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    /// The 2-byte length field.
    Length,
    /// The 2-byte slave-id field.
    SlaveId,
    /// The 1-byte acknowledge code.
    Ack,
    /// The 1-byte input status bitmask.
    Status,
    /// The 2-byte CRC field.
    Crc,
    /// The trailing EOP delimiter.
    Eop,
}

impl std::fmt::Display for FrameField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameField::Length => write!(f, "packet length"),
            FrameField::SlaveId => write!(f, "slave id"),
            FrameField::Ack => write!(f, "ack"),
            FrameField::Status => write!(f, "keyboard state"),
            FrameField::Crc => write!(f, "checksum"),
            FrameField::Eop => write!(f, "end of packet"),
        }
    }
}
