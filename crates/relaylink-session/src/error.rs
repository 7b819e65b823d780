//! Session error types.

use relaylink_protocol::{Profile, ProtocolError};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A command was issued with no port open.
    #[error("port not selected")]
    NotConnected,

    /// The addressing slave id is missing or was rejected.
    #[error("invalid com slave id")]
    InvalidSlaveId,

    /// The requested baud rate is not in the supported set.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// The command does not exist on the session's firmware profile.
    #[error("command 0x{code:02X} not supported by profile {profile:?}")]
    UnsupportedCommand {
        /// Wire code of the rejected command.
        code: u8,
        /// Profile the session was built for.
        profile: Profile,
    },

    /// Both write attempts failed; the session has begun reconnecting.
    #[error("failed to write")]
    WriteFailed,

    /// A protocol-level failure (argument validation, encoding).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A transport-level failure (open, write).
    #[error(transparent)]
    Transport(#[from] TransportError),
}
