//! Serial session layer for the relaylink slave controller.
//!
//! This crate owns everything stateful about talking to a slave: the serial
//! transport, the connection lifecycle, deferred configuration changes, and
//! the input shift register. The wire format itself lives in
//! [`relaylink_protocol`].
//!
//! A [`Session`] is single-threaded and cooperative. The owning loop calls
//! [`Session::poll`] every [`POLL_INTERVAL`] and drains [`SessionEvent`]s in
//! between; commands are plain method calls that complete before the next
//! poll tick runs.

mod config;
mod error;
mod events;
mod inputs;
mod session;
mod transport;

pub use config::*;
pub use error::*;
pub use events::*;
pub use inputs::*;
pub use session::*;
pub use transport::*;
