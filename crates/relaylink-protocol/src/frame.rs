//! Frame construction and the inbound frame parser.
//!
//! Outbound frames wrap a command for one slave:
//!
//! ```text
//! +-----+----------------------------------------------+-------------+-----+
//! | SOP | escaped[ length(2,LE) slave(2,LE) code args ] | escaped[crc]| EOP |
//! +-----+----------------------------------------------+-------------+-----+
//! ```
//!
//! `length` counts the command code and arguments plus the length, slave-id,
//! and CRC fields themselves ([`FRAME_OVERHEAD`]). The CRC covers the
//! unescaped `length..args` region.
//!
//! Inbound responses use the same framing with a fixed payload of one ack
//! byte and one input-status byte.

use bytes::BufMut;
use log::{debug, trace};

use crate::codec::{crc16, escape_into, unescape_one, ByteSource};
use crate::commands::Command;
use crate::constants::*;
use crate::error::{FrameField, ProtocolError};
use crate::response::{Ack, ResponseFrame};

// ============================================================================
// Outbound Frames
// ============================================================================

/// Build the wire bytes for `command` addressed to `slave_id`.
///
/// Argument ranges are checked before anything is encoded.
pub fn build_frame(slave_id: u16, command: &Command) -> Result<Vec<u8>, ProtocolError> {
    command.validate()?;
    let mut args = Vec::new();
    command.encode_args(&mut args);
    Ok(build_raw_frame(slave_id, command.code(), &args))
}

/// Build a frame from a raw command code and pre-encoded argument bytes.
pub fn build_raw_frame(slave_id: u16, code: u8, args: &[u8]) -> Vec<u8> {
    let length = (args.len() + 1 + FRAME_OVERHEAD) as u16;

    let mut data = Vec::with_capacity(args.len() + 1 + LENGTH_FIELD_SIZE + SLAVE_ID_FIELD_SIZE);
    data.put_u16_le(length);
    data.put_u16_le(slave_id);
    data.push(code);
    data.extend_from_slice(args);

    let crc = crc16(&data);

    // Worst case every byte escapes to two.
    let mut frame = Vec::with_capacity(2 * (data.len() + CRC_FIELD_SIZE) + 2);
    frame.push(SOP);
    escape_into(&mut frame, &data);
    escape_into(&mut frame, &crc.to_le_bytes());
    frame.push(EOP);
    frame
}

/// Build the wire bytes of a response frame, as the slave would emit them.
///
/// `ack` is the raw acknowledge byte so that rejected and malformed codes
/// can be produced. Used by device simulators and tests.
pub fn build_response_frame(slave_id: u16, ack: u8, status: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(RESPONSE_LENGTH as usize - CRC_FIELD_SIZE);
    data.put_u16_le(RESPONSE_LENGTH);
    data.put_u16_le(slave_id);
    data.push(ack);
    data.push(status);

    let crc = crc16(&data);

    let mut frame = Vec::with_capacity(2 * (data.len() + CRC_FIELD_SIZE) + 2);
    frame.push(SOP);
    escape_into(&mut frame, &data);
    escape_into(&mut frame, &crc.to_le_bytes());
    frame.push(EOP);
    frame
}

// ============================================================================
// Inbound Frame Parser
// ============================================================================

/// Parser position within a response frame, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    WaitSop,
    ReadLength,
    ReadSlave,
    ReadAck,
    ReadStatus,
    ReadCrc,
    ReadEop,
    Validate,
}

/// Terminal or idle result of one parser poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No byte was available before a frame started; try again later.
    Idle,
    /// A frame passed validation.
    Complete(ResponseFrame),
    /// The frame attempt was aborted. If the slave-id field had already
    /// been decoded it is reported here, unconfirmed.
    Failed {
        /// Why the attempt was aborted.
        error: ProtocolError,
        /// Slave id decoded before the failure, if any.
        slave_id: Option<u16>,
    },
}

/// Incremental state machine decoding one response frame at a time.
///
/// Drive it with [`FrameParser::poll`]. Every outcome other than
/// [`PollOutcome::Idle`] is terminal for the current frame attempt: the
/// parser resets itself and the next poll starts a fresh attempt.
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    length_bytes: [u8; 2],
    slave_bytes: [u8; 2],
    slave_id: Option<u16>,
    ack: u8,
    status: u8,
    crc_bytes: [u8; 2],
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser waiting for a start delimiter.
    pub fn new() -> Self {
        FrameParser {
            state: ParseState::WaitSop,
            length_bytes: [0; 2],
            slave_bytes: [0; 2],
            slave_id: None,
            ack: 0,
            status: 0,
            crc_bytes: [0; 2],
        }
    }

    /// Discard any in-progress frame attempt.
    pub fn reset(&mut self) {
        *self = FrameParser::new();
    }

    /// Run the state machine against `src` until it goes idle or reaches a
    /// terminal outcome.
    pub fn poll<S: ByteSource>(&mut self, src: &mut S) -> PollOutcome {
        loop {
            match self.state {
                ParseState::WaitSop => {
                    let Some(byte) = src.next_byte() else {
                        return PollOutcome::Idle;
                    };
                    if byte != SOP {
                        return self.fail(ProtocolError::FrameSync {
                            expected: SOP,
                            actual: byte,
                        });
                    }
                    self.state = ParseState::ReadLength;
                }

                ParseState::ReadLength => match self.read_pair(src, FrameField::Length) {
                    Ok(bytes) => {
                        self.length_bytes = bytes;
                        self.state = ParseState::ReadSlave;
                    }
                    Err(error) => return self.fail(error),
                },

                ParseState::ReadSlave => match self.read_pair(src, FrameField::SlaveId) {
                    Ok(bytes) => {
                        self.slave_bytes = bytes;
                        self.slave_id = Some(u16::from_le_bytes(bytes));
                        self.state = ParseState::ReadAck;
                    }
                    Err(error) => return self.fail(error),
                },

                ParseState::ReadAck => match read_unescaped(src, FrameField::Ack) {
                    Ok(byte) => {
                        self.ack = byte;
                        self.state = ParseState::ReadStatus;
                    }
                    Err(error) => return self.fail(error),
                },

                ParseState::ReadStatus => match read_unescaped(src, FrameField::Status) {
                    Ok(byte) => {
                        self.status = byte;
                        self.state = ParseState::ReadCrc;
                    }
                    Err(error) => return self.fail(error),
                },

                ParseState::ReadCrc => match self.read_pair(src, FrameField::Crc) {
                    Ok(bytes) => {
                        self.crc_bytes = bytes;
                        self.state = ParseState::ReadEop;
                    }
                    Err(error) => return self.fail(error),
                },

                ParseState::ReadEop => match src.next_byte() {
                    None => {
                        return self.fail(ProtocolError::Truncated {
                            field: FrameField::Eop,
                        })
                    }
                    Some(EOP) => self.state = ParseState::Validate,
                    Some(byte) => {
                        return self.fail(ProtocolError::FrameSync {
                            expected: EOP,
                            actual: byte,
                        })
                    }
                },

                ParseState::Validate => return self.validate(),
            }
        }
    }

    fn read_pair<S: ByteSource>(
        &mut self,
        src: &mut S,
        field: FrameField,
    ) -> Result<[u8; 2], ProtocolError> {
        let lo = read_unescaped(src, field)?;
        let hi = read_unescaped(src, field)?;
        Ok([lo, hi])
    }

    fn validate(&mut self) -> PollOutcome {
        let mut data = [0u8; 6];
        data[..2].copy_from_slice(&self.length_bytes);
        data[2..4].copy_from_slice(&self.slave_bytes);
        data[4] = self.ack;
        data[5] = self.status;

        let computed = crc16(&data);
        let received = u16::from_le_bytes(self.crc_bytes);
        if computed != received {
            return self.fail(ProtocolError::ChecksumMismatch { computed, received });
        }

        let length = u16::from_le_bytes(self.length_bytes);
        if length != RESPONSE_LENGTH {
            return self.fail(ProtocolError::BadLength {
                expected: RESPONSE_LENGTH,
                actual: length,
            });
        }

        let frame = ResponseFrame {
            slave_id: u16::from_le_bytes(self.slave_bytes),
            ack: Ack::from_byte(self.ack),
            status: self.status,
        };
        trace!(
            "accepted frame from slave {}: ack={:?} status=0x{:02X}",
            frame.slave_id,
            frame.ack,
            frame.status
        );
        self.reset();
        PollOutcome::Complete(frame)
    }

    fn fail(&mut self, error: ProtocolError) -> PollOutcome {
        let slave_id = self.slave_id;
        debug!("frame attempt aborted: {}", error);
        self.reset();
        PollOutcome::Failed { error, slave_id }
    }
}

fn read_unescaped<S: ByteSource>(src: &mut S, field: FrameField) -> Result<u8, ProtocolError> {
    match unescape_one(src)? {
        Some(byte) => Ok(byte),
        None => Err(ProtocolError::Truncated { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{unescape, SliceSource};

    fn poll_slice(parser: &mut FrameParser, bytes: &[u8]) -> PollOutcome {
        let mut src = SliceSource::new(bytes);
        parser.poll(&mut src)
    }

    #[test]
    fn test_build_frame_layout() {
        // Command 2 (SetSlaveId) with args [5, 0] addressed to slave 0.
        let frame = build_frame(0, &Command::SetSlaveId { id: 5 }).unwrap();

        assert_eq!(frame.first(), Some(&SOP));
        assert_eq!(frame.last(), Some(&EOP));

        let interior = unescape(&frame[1..frame.len() - 1]).unwrap();
        // length(2) + slave(2) + code(1) + args(2) + crc(2)
        assert_eq!(interior.len(), 9);
        // length = args + code + overhead = 2 + 1 + 6
        assert_eq!(u16::from_le_bytes([interior[0], interior[1]]), 9);
        assert_eq!(u16::from_le_bytes([interior[2], interior[3]]), 0);
        assert_eq!(interior[4], 2);
        assert_eq!(&interior[5..7], &[5, 0]);

        let crc = u16::from_le_bytes([interior[7], interior[8]]);
        assert_eq!(crc, crc16(&interior[..7]));
    }

    #[test]
    fn test_build_frame_escapes_reserved_payload_bytes() {
        // Slave id 0xE2E1 and args full of reserved values force escaping.
        let frame = build_raw_frame(0xE2E1, 0, &[SOP, EOP, ESC, 0x42]);

        // Interior bytes between the two delimiters must not contain any
        // raw reserved value outside an escape pair.
        let interior = &frame[1..frame.len() - 1];
        let mut i = 0;
        while i < interior.len() {
            if interior[i] == ESC {
                i += 2;
                continue;
            }
            assert_ne!(interior[i], SOP);
            assert_ne!(interior[i], EOP);
            i += 1;
        }

        let logical = unescape(interior).unwrap();
        assert_eq!(u16::from_le_bytes([logical[2], logical[3]]), 0xE2E1);
        assert_eq!(&logical[5..9], &[SOP, EOP, ESC, 0x42]);
    }

    #[test]
    fn test_parse_response_roundtrip() {
        let bytes = build_response_frame(7, ACK, 0b0000_0101);
        let mut parser = FrameParser::new();

        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Complete(frame) => {
                assert_eq!(frame.slave_id, 7);
                assert_eq!(frame.ack, Ack::Ack);
                assert_eq!(frame.status, 0b0000_0101);
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_with_escaped_slave_id() {
        let bytes = build_response_frame(0xE1E1, NAK, 0xFF);
        let mut parser = FrameParser::new();

        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Complete(frame) => {
                assert_eq!(frame.slave_id, 0xE1E1);
                assert_eq!(frame.ack, Ack::Nak);
                assert_eq!(frame.status, 0xFF);
            }
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_idle_when_no_data() {
        let mut parser = FrameParser::new();
        assert_eq!(poll_slice(&mut parser, &[]), PollOutcome::Idle);
        // Still able to parse a frame afterwards.
        let bytes = build_response_frame(1, ACK, 0);
        assert!(matches!(
            poll_slice(&mut parser, &bytes),
            PollOutcome::Complete(_)
        ));
    }

    #[test]
    fn test_first_byte_not_sop() {
        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &[0x42]) {
            PollOutcome::Failed { error, slave_id } => {
                assert_eq!(
                    error,
                    ProtocolError::FrameSync {
                        expected: SOP,
                        actual: 0x42
                    }
                );
                assert_eq!(slave_id, None);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_at_each_field() {
        let full = build_response_frame(0x0102, ACK, 0x55);
        // This frame contains no escape pairs, so wire offsets map directly
        // to logical fields: SOP, len(2), slave(2), ack, status, crc(2), EOP.
        assert_eq!(full.len(), 10);

        let cases = [
            (1, FrameField::Length),
            (2, FrameField::Length),
            (3, FrameField::SlaveId),
            (4, FrameField::SlaveId),
            (5, FrameField::Ack),
            (6, FrameField::Status),
            (7, FrameField::Crc),
            (8, FrameField::Crc),
            (9, FrameField::Eop),
        ];

        for (cut, field) in cases {
            let mut parser = FrameParser::new();
            match poll_slice(&mut parser, &full[..cut]) {
                PollOutcome::Failed { error, .. } => {
                    assert_eq!(
                        error,
                        ProtocolError::Truncated { field },
                        "cut at {}",
                        cut
                    );
                }
                other => panic!("cut at {}: expected Failed, got {:?}", cut, other),
            }

            // No residual state: the same parser accepts a fresh frame.
            assert!(matches!(
                poll_slice(&mut parser, &full),
                PollOutcome::Complete(_)
            ));
        }
    }

    #[test]
    fn test_truncation_after_slave_reports_unconfirmed_id() {
        let full = build_response_frame(0x0102, ACK, 0x55);
        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &full[..6]) {
            PollOutcome::Failed { slave_id, .. } => assert_eq!(slave_id, Some(0x0102)),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_mismatch_keeps_slave_id() {
        let mut bytes = build_response_frame(9, ACK, 0x00);
        // Flip the status byte without touching the CRC.
        bytes[6] ^= 0x01;

        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Failed { error, slave_id } => {
                assert!(matches!(error, ProtocolError::ChecksumMismatch { .. }));
                assert_eq!(slave_id, Some(9));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_eop_is_frame_sync_error() {
        let mut bytes = build_response_frame(1, ACK, 0);
        let last = bytes.len() - 1;
        bytes[last] = 0x42;

        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Failed { error, .. } => {
                assert_eq!(
                    error,
                    ProtocolError::FrameSync {
                        expected: EOP,
                        actual: 0x42
                    }
                );
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_escape_aborts_frame() {
        // SOP then an escape pair with an undefined substitute.
        let bytes = [SOP, ESC, 0x07];
        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Failed { error, .. } => {
                assert_eq!(error, ProtocolError::InvalidEscape { value: 0x07 });
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_length_field_rejected() {
        // Hand-build a checksummed frame whose length field is wrong.
        let mut data = Vec::new();
        data.extend_from_slice(&9u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.push(ACK);
        data.push(0x00);
        let crc = crc16(&data);

        let mut bytes = vec![SOP];
        escape_into(&mut bytes, &data);
        escape_into(&mut bytes, &crc.to_le_bytes());
        bytes.push(EOP);

        let mut parser = FrameParser::new();
        match poll_slice(&mut parser, &bytes) {
            PollOutcome::Failed { error, slave_id } => {
                assert_eq!(
                    error,
                    ProtocolError::BadLength {
                        expected: RESPONSE_LENGTH,
                        actual: 9
                    }
                );
                assert_eq!(slave_id, Some(3));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_two_frames_back_to_back() {
        let mut bytes = build_response_frame(1, ACK, 0x01);
        bytes.extend(build_response_frame(1, ACK, 0x03));

        let mut parser = FrameParser::new();
        let mut src = SliceSource::new(&bytes);

        match parser.poll(&mut src) {
            PollOutcome::Complete(frame) => assert_eq!(frame.status, 0x01),
            other => panic!("expected Complete, got {:?}", other),
        }
        match parser.poll(&mut src) {
            PollOutcome::Complete(frame) => assert_eq!(frame.status, 0x03),
            other => panic!("expected Complete, got {:?}", other),
        }
        assert_eq!(parser.poll(&mut src), PollOutcome::Idle);
    }
}
