//! Events the session reports upward.
//!
//! The session is UI-agnostic: it queues events and the owner drains them
//! after each call. Status texts keep the wording the device's original
//! operator tooling displayed, so existing operators read familiar messages.

use relaylink_protocol::ProtocolError;

/// Status line shown while the link is healthy.
pub const STATUS_READY: &str = "READY";
/// The slave rejected the last command.
pub const STATUS_NAK: &str = "NAK";
/// A frame arrived but its checksum did not match.
pub const STATUS_INVALID_CHECKSUM: &str = "INVALID CHECKSUM";
/// The port could not be opened.
pub const STATUS_BAD_PORT: &str = "BAD PORT";
/// Both write attempts failed.
pub const STATUS_WRITE_FAILED: &str = "FAILED TO WRITE";
/// A command was issued with no port open.
pub const STATUS_PORT_NOT_SELECTED: &str = "PORT NOT SELECTED";
/// A command was issued without a valid addressing slave id.
pub const STATUS_INVALID_SLAVE_ID: &str = "INVALID COM SLAVE ID";
/// The first byte of a frame attempt was not the start delimiter.
pub const STATUS_NOT_SOP: &str = "FIRST BYTE WAS NOT SOP";
/// The closing delimiter was missing or wrong.
pub const STATUS_NOT_EOP: &str = "LAST BYTE WAS NOT EOP";

/// Events produced by the session for its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The status line changed. `is_ready` is true only for [`STATUS_READY`].
    StatusChanged {
        /// Display text.
        text: String,
        /// Whether the link is in its healthy state.
        is_ready: bool,
    },

    /// A frame reported a slave id. `confirmed` is false when the frame did
    /// not pass validation; such an id is for display only and is never
    /// used to update configuration.
    LastSlaveUpdated {
        /// The reported id.
        id: u16,
        /// Whether the frame carrying it validated.
        confirmed: bool,
    },

    /// A digital input line changed between the two most recent validated
    /// frames.
    InputLineChanged {
        /// Input line number; bit 0 of the status byte is line 0.
        index: usize,
        /// Sampled state in the previous frame.
        before: bool,
        /// Sampled state in the latest frame.
        now: bool,
    },
}

/// Status text for a parse failure, in the legacy display wording.
pub(crate) fn failure_status_text(error: &ProtocolError) -> String {
    match error {
        ProtocolError::FrameSync { expected, .. } if *expected == relaylink_protocol::SOP => {
            STATUS_NOT_SOP.to_string()
        }
        ProtocolError::FrameSync { .. } => STATUS_NOT_EOP.to_string(),
        ProtocolError::Truncated { field } => {
            format!("FAILED TO READ {}", field.to_string().to_uppercase())
        }
        ProtocolError::InvalidEscape { .. } => "INVALID ESCAPE SEQUENCE".to_string(),
        ProtocolError::ChecksumMismatch { .. } => STATUS_INVALID_CHECKSUM.to_string(),
        ProtocolError::BadLength { .. } => "INVALID PACKET LENGTH".to_string(),
        ProtocolError::InvalidArgument { .. } => error.to_string().to_uppercase(),
    }
}
