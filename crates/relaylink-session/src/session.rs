//! The session controller.
//!
//! One session owns one serial connection to one slave. It is
//! single-threaded and cooperative: the owner calls [`Session::poll`] on a
//! fixed cadence ([`POLL_INTERVAL`]) and drains events between calls. There
//! is no background thread; a command is fully written before the next poll
//! tick starts collecting the response.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use relaylink_protocol::{
    build_frame, Ack, ByteSource, Command, FrameParser, PollOutcome, Profile, BAUD_RATES,
};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::events::{
    failure_status_text, SessionEvent, STATUS_BAD_PORT, STATUS_INVALID_SLAVE_ID, STATUS_NAK,
    STATUS_PORT_NOT_SELECTED, STATUS_READY, STATUS_WRITE_FAILED,
};
use crate::inputs::InputShiftRegister;
use crate::transport::{Connector, SerialConnector, Transport};

/// Cadence at which the owner should call [`Session::poll`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Delay before the single retry of an empty byte read.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Pulls bytes from a transport with the protocol's bounded retry: one
/// immediate attempt, and if empty, one more after [`READ_RETRY_DELAY`].
struct RetryingSource<'a, T: Transport> {
    transport: &'a mut T,
}

impl<T: Transport> ByteSource for RetryingSource<'_, T> {
    fn next_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.transport.read_byte() {
            return Some(byte);
        }
        thread::sleep(READ_RETRY_DELAY);
        self.transport.read_byte()
    }
}

/// Master-side session for one slave controller.
///
/// Owns the transport handle, the in-progress parser state, the pending
/// configuration changes, and the input shift register. All mutation goes
/// through the public methods; consumers observe the session through the
/// event queue.
pub struct Session<C: Connector = SerialConnector> {
    connector: C,
    profile: Profile,

    // Connection configuration
    port_name: Option<String>,
    baud: u32,
    slave_id: Option<u16>,

    // Connection state
    transport: Option<C::Port>,
    parser: FrameParser,

    // Changes registered by set_speed/set_slave_id, applied after the next
    // terminal parser outcome.
    pending_speed: Option<u8>,
    pending_slave: Option<u16>,

    inputs: InputShiftRegister,
    events: VecDeque<SessionEvent>,
}

impl Session<SerialConnector> {
    /// Create a disconnected session for the given firmware profile.
    pub fn new(profile: Profile) -> Self {
        Session::with_connector(profile, SerialConnector)
    }

    /// Create a session from a validated configuration. Does not connect;
    /// call [`Session::connect`] with the configured port afterwards.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let mut session = Session::new(config.profile);
        session.baud = config.baud;
        session.slave_id = config.slave_id();
        Ok(session)
    }
}

impl<C: Connector> Session<C> {
    /// Create a disconnected session using a custom connector.
    pub fn with_connector(profile: Profile, connector: C) -> Self {
        Session {
            connector,
            profile,
            port_name: None,
            baud: BAUD_RATES[BAUD_RATES.len() - 1],
            slave_id: None,
            transport: None,
            parser: FrameParser::new(),
            pending_speed: None,
            pending_slave: None,
            inputs: InputShiftRegister::new(),
            events: VecDeque::new(),
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Open `port_name` at `baud`, closing any existing connection first.
    ///
    /// The baud rate is checked against the supported set before any I/O.
    /// On open failure the session stays disconnected and a
    /// [`STATUS_BAD_PORT`] status is emitted.
    pub fn connect(&mut self, port_name: &str, baud: u32) -> Result<(), SessionError> {
        if !BAUD_RATES.contains(&baud) {
            return Err(SessionError::UnsupportedBaud(baud));
        }

        self.disconnect();
        self.port_name = Some(port_name.to_string());
        self.baud = baud;

        match self.connector.open(port_name, baud) {
            Ok(transport) => {
                info!(port = port_name, baud, "connected");
                self.transport = Some(transport);
                Ok(())
            }
            Err(err) => {
                warn!(port = port_name, "open failed: {}", err);
                self.push_status(STATUS_BAD_PORT);
                Err(err.into())
            }
        }
    }

    /// Close the connection if one is open. Idempotent. Discards any
    /// in-progress frame attempt.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            debug!("disconnected");
        }
        self.parser.reset();
    }

    /// Reconnect to the remembered port at the current baud.
    fn reconnect(&mut self) {
        let Some(port_name) = self.port_name.clone() else {
            return;
        };
        let baud = self.baud;
        // Failure already emitted BAD PORT; the session stays disconnected.
        let _ = self.connect(&port_name, baud);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Build and write a command frame.
    ///
    /// Requires an open transport and a valid addressing slave id; argument
    /// ranges are checked before anything touches the wire. A failed write
    /// is retried once; if the retry also fails the session reconnects and
    /// reports [`STATUS_WRITE_FAILED`]. Does not wait for a response.
    pub fn send(&mut self, command: &Command) -> Result<(), SessionError> {
        if self.transport.is_none() {
            self.push_status(STATUS_PORT_NOT_SELECTED);
            return Err(SessionError::NotConnected);
        }
        let Some(slave_id) = self.slave_id else {
            self.push_status(STATUS_INVALID_SLAVE_ID);
            return Err(SessionError::InvalidSlaveId);
        };
        if !command.supported_by(self.profile) {
            return Err(SessionError::UnsupportedCommand {
                code: command.code(),
                profile: self.profile,
            });
        }

        let frame = build_frame(slave_id, command)?;

        let Some(transport) = self.transport.as_mut() else {
            return Err(SessionError::NotConnected);
        };
        let first = match transport.write(&frame) {
            Ok(()) => {
                debug!(code = command.code(), len = frame.len(), "frame written");
                return Ok(());
            }
            Err(err) => err,
        };

        warn!("write failed, retrying once: {}", first);
        match transport.write(&frame) {
            Ok(()) => {
                debug!(code = command.code(), len = frame.len(), "frame written on retry");
                Ok(())
            }
            Err(err) => {
                warn!("write retry failed: {}", err);
                self.reconnect();
                self.push_status(STATUS_WRITE_FAILED);
                Err(SessionError::WriteFailed)
            }
        }
    }

    /// Ask the slave to switch serial speed.
    ///
    /// On successful send the change is registered as pending; the local
    /// baud changes (with a reconnect) only after the next terminal parser
    /// outcome.
    pub fn set_speed(&mut self, index: u8) -> Result<(), SessionError> {
        self.send(&Command::SetSpeedIndex { index })?;
        self.pending_speed = Some(index);
        Ok(())
    }

    /// Ask the slave to adopt a new address.
    ///
    /// On successful send the change is registered as pending; the local
    /// addressing id follows after the next terminal parser outcome.
    pub fn set_slave_id(&mut self, id: u16) -> Result<(), SessionError> {
        self.send(&Command::SetSlaveId { id })?;
        self.pending_slave = Some(id);
        Ok(())
    }

    /// Set or clear the local addressing slave id. `None` marks the id as
    /// invalid (for example a rejected operator entry); sends are refused
    /// until a valid id is supplied.
    pub fn set_com_slave_id(&mut self, id: Option<u16>) {
        self.slave_id = id;
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Drive one parser attempt against the transport.
    ///
    /// Call on the [`POLL_INTERVAL`] cadence. Every terminal parser outcome
    /// updates the event queue and then applies pending configuration
    /// changes; an idle tick applies pending changes as well, so a change
    /// whose response was lost still lands.
    pub fn poll(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let outcome = {
            let mut source = RetryingSource { transport };
            self.parser.poll(&mut source)
        };

        match outcome {
            PollOutcome::Idle => {}

            PollOutcome::Complete(frame) => {
                match frame.ack {
                    Ack::Ack => self.push_status(STATUS_READY),
                    Ack::Nak => self.push_status(STATUS_NAK),
                }
                self.events.push_back(SessionEvent::LastSlaveUpdated {
                    id: frame.slave_id,
                    confirmed: true,
                });
                for (index, before, now) in self.inputs.update(frame.status) {
                    self.events
                        .push_back(SessionEvent::InputLineChanged { index, before, now });
                }
            }

            PollOutcome::Failed { error, slave_id } => {
                debug!("parse failure: {}", error);
                self.push_status(&failure_status_text(&error));
                if let Some(id) = slave_id {
                    self.events
                        .push_back(SessionEvent::LastSlaveUpdated { id, confirmed: false });
                }
            }
        }

        self.apply_pending();
    }

    /// Commit pending configuration changes.
    ///
    /// A pending slave id only updates the local addressing field. A
    /// pending speed updates the local baud and reconnects, discarding any
    /// parse state.
    fn apply_pending(&mut self) {
        if let Some(id) = self.pending_slave.take() {
            info!(slave_id = id, "pending slave id applied");
            self.slave_id = Some(id);
        }
        if let Some(index) = self.pending_speed.take() {
            if let Some(&baud) = BAUD_RATES.get(usize::from(index)) {
                info!(baud, "pending speed applied, reconnecting");
                self.baud = baud;
                self.reconnect();
            }
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Pop the oldest undelivered event.
    pub fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Whether a transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Baud rate of the current (or next) connection.
    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// The local addressing slave id, if valid.
    pub fn com_slave_id(&self) -> Option<u16> {
        self.slave_id
    }

    /// Firmware profile this session was built for.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// The input shift register (before/now samples).
    pub fn inputs(&self) -> &InputShiftRegister {
        &self.inputs
    }

    fn push_status(&mut self, text: &str) {
        self.events.push_back(SessionEvent::StatusChanged {
            text: text.to_string(),
            is_ready: text == STATUS_READY,
        });
    }
}
