use bytes::{BufMut, Bytes, BytesMut};

use crate::{ArmLinkError, ArmLinkResult};

/// Frame start marker.
pub const START_MARKER: [u8; 2] = [0xAA, 0xAA];
/// Frame end marker.
pub const END_MARKER: [u8; 2] = [0x0D, 0x0A];
/// Frame header size (start marker plus length byte).
pub const FRAME_HEADER_SIZE: usize = 3;
/// Frame trailer size (checksum plus end marker).
pub const FRAME_TRAILER_SIZE: usize = 3;
/// Size of a frame with an empty payload.
pub const MIN_FRAME_SIZE: usize = 8;
/// Maximum payload size representable in the one-byte length field.
///
/// The length byte counts the command and sequence bytes in addition to the
/// payload, i.e. `length == 2 + payload.len()`.
pub const MAX_PAYLOAD_SIZE: usize = 253;

/// A frame on the arm's serial link.
///
/// Locally built frames (via [`Frame::new`]) carry the computed checksum and
/// the standard end marker. Frames decoded from the wire carry the checksum
/// and end-marker bytes exactly as received; neither is validated on receipt.
/// Use [`Frame::checksum_ok`] and [`Frame::end_marker_ok`] to inspect them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    command_id: u8,
    sequence: u8,
    payload: Bytes,
    checksum: u8,
    end_marker: [u8; 2],
}

impl Frame {
    /// Builds a frame with the checksum computed from its fields.
    ///
    /// Fails with `InvalidArgument` if the payload does not fit the one-byte
    /// length field.
    pub fn new(
        command_id: u8,
        sequence: u8,
        payload: impl Into<Bytes>,
    ) -> ArmLinkResult<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ArmLinkError::InvalidArgument(format!(
                "payload length {} exceeds the {} byte maximum",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let length = (payload.len() + 2) as u8;
        let checksum = wire_checksum(length, command_id, sequence, &payload);

        Ok(Self {
            command_id,
            sequence,
            payload,
            checksum,
            end_marker: END_MARKER,
        })
    }

    /// Assembles a frame from fields read off the wire, trailer bytes as received.
    pub(crate) fn from_wire(
        command_id: u8,
        sequence: u8,
        payload: Bytes,
        checksum: u8,
        end_marker: [u8; 2],
    ) -> Self {
        Self {
            command_id,
            sequence,
            payload,
            checksum,
            end_marker,
        }
    }

    /// Returns the command id.
    #[inline]
    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Returns a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns a clone of the payload as `Bytes` (cheap, zero-copy).
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Returns the value of the frame's length byte.
    #[inline]
    pub fn length(&self) -> u8 {
        (self.payload.len() + 2) as u8
    }

    /// Returns the checksum byte carried by the frame.
    #[inline]
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Returns the end-marker bytes carried by the frame.
    #[inline]
    pub fn end_marker(&self) -> [u8; 2] {
        self.end_marker
    }

    /// Returns whether the carried checksum matches the sum over the length,
    /// command, sequence, and payload bytes (mod 256).
    pub fn checksum_ok(&self) -> bool {
        self.checksum == wire_checksum(self.length(), self.command_id, self.sequence, &self.payload)
    }

    /// Returns whether the carried end marker equals the fixed `0D 0A` marker.
    pub fn end_marker_ok(&self) -> bool {
        self.end_marker == END_MARKER
    }

    /// Encodes the frame into its wire representation.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + self.payload.len());
        buf.put_slice(&START_MARKER);
        buf.put_u8(self.length());
        buf.put_u8(self.command_id);
        buf.put_u8(self.sequence);
        buf.put_slice(&self.payload);
        buf.put_u8(self.checksum);
        buf.put_slice(&self.end_marker);
        buf.freeze()
    }
}

/// Unsigned 8-bit sum over the length byte through the last payload byte.
pub(crate) fn wire_checksum(length: u8, command_id: u8, sequence: u8, payload: &[u8]) -> u8 {
    let mut sum = length.wrapping_add(command_id).wrapping_add(sequence);
    for byte in payload {
        sum = sum.wrapping_add(*byte);
    }
    sum
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encode_clear_alarms() {
        // the worked clear-alarms request
        let frame = Frame::new(0x8A, 0x00, Bytes::new()).unwrap();
        assert_eq!(
            frame.encode().as_ref(),
            &[0xAA, 0xAA, 0x02, 0x8A, 0x00, 0x8C, 0x0D, 0x0A]
        );
    }

    #[test]
    fn encode_version_query() {
        // the connection-test probe
        let frame = Frame::new(0x01, 0x00, Bytes::new()).unwrap();
        assert_eq!(
            frame.encode().as_ref(),
            &[0xAA, 0xAA, 0x02, 0x01, 0x00, 0x03, 0x0D, 0x0A]
        );
    }

    #[test]
    fn checksum_covers_length_through_payload() {
        let frame = Frame::new(0x81, 0x7F, vec![0x10, 0x20, 0xF0]).unwrap();

        let expected: u32 = [frame.length(), 0x81, 0x7F, 0x10, 0x20, 0xF0]
            .iter()
            .map(|b| u32::from(*b))
            .sum();
        assert_eq!(frame.checksum(), (expected % 256) as u8);
    }

    #[test]
    fn payload_at_maximum_size() {
        let frame = Frame::new(0x55, 0x01, vec![0xEE; MAX_PAYLOAD_SIZE]).unwrap();
        assert_eq!(frame.length(), 0xFF);
        assert_eq!(
            frame.encode().len(),
            MIN_FRAME_SIZE + MAX_PAYLOAD_SIZE
        );
    }

    #[test]
    fn payload_too_long() {
        let err = Frame::new(0x55, 0x01, vec![0x00; MAX_PAYLOAD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, ArmLinkError::InvalidArgument(_)));
    }

    #[test]
    fn locally_built_frame_has_valid_trailer() {
        let frame = Frame::new(0xCF, 0x2A, vec![0x01]).unwrap();
        assert!(frame.checksum_ok());
        assert!(frame.end_marker_ok());
    }

    #[test]
    fn wire_frame_keeps_received_trailer() {
        let frame = Frame::from_wire(0x81, 0x00, Bytes::new(), 0xFF, [0x00, 0x00]);
        assert!(!frame.checksum_ok());
        assert!(!frame.end_marker_ok());
        assert_eq!(frame.checksum(), 0xFF);
        assert_eq!(frame.end_marker(), [0x00, 0x00]);
    }

    #[test]
    fn payload_bytes_zero_copy() {
        let payload = Bytes::from_static(b"raw state");
        let frame = Frame::new(0x81, 0x00, payload.clone()).unwrap();

        let cloned = frame.payload_bytes();
        assert_eq!(cloned, payload);
        assert_eq!(cloned.as_ptr(), payload.as_ptr());
    }
}
