//! Wire protocol for the relaylink slave controller.
//!
//! This crate implements the link layer of the binary serial protocol spoken
//! by the output/relay/keyboard slave controllers: byte stuffing, the
//! nibble-wise CRC-16, outbound frame construction, and an incremental
//! parser for inbound response frames.
//!
//! Everything here is pure: no I/O, no clocks, no retained connection
//! state. The session layer feeds the parser from a byte source and decides
//! what each outcome means for the connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use relaylink_protocol::{build_frame, Command, FrameParser, PollOutcome};
//!
//! // Build a command frame
//! let frame = build_frame(0, &Command::ForceUpdate)?;
//!
//! // Parse a response
//! let mut parser = FrameParser::new();
//! match parser.poll(&mut source) {
//!     PollOutcome::Complete(response) => { /* ... */ }
//!     PollOutcome::Failed { error, .. } => { /* ... */ }
//!     PollOutcome::Idle => { /* try again next tick */ }
//! }
//! ```

mod codec;
mod commands;
mod constants;
mod error;
mod frame;
mod response;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use response::*;
