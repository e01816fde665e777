use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::frame::{
    Frame, FRAME_HEADER_SIZE, FRAME_TRAILER_SIZE, START_MARKER,
};
use crate::ArmLinkError;

/// Streaming decoder for frames received from the arm.
///
/// Only the start marker and the length byte are required to be structurally
/// valid; the checksum and end marker are handed through as received (the
/// device's response trailer is undocumented and the caller decides whether
/// to check it).
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Creates a new `FrameCodec` instance.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ArmLinkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let marker = [src[0], src[1]];
        if marker != START_MARKER {
            // consume nothing beyond the bytes inspected
            return Err(ArmLinkError::BadHeader(marker));
        }

        let length = src[2] as usize;
        if length < 2 {
            return Err(ArmLinkError::InvalidArgument(format!(
                "frame length byte {} below the 2 byte minimum",
                length
            )));
        }

        let frame_size = FRAME_HEADER_SIZE + length + FRAME_TRAILER_SIZE;
        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let command_id = src.get_u8();
        let sequence = src.get_u8();
        let payload = src.split_to(length - 2).freeze();
        let checksum = src.get_u8();
        let end_marker = [src.get_u8(), src.get_u8()];

        Ok(Some(Frame::from_wire(
            command_id, sequence, payload, checksum, end_marker,
        )))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let expected = if src.len() < FRAME_HEADER_SIZE {
                    FRAME_HEADER_SIZE
                } else {
                    FRAME_HEADER_SIZE + src[2] as usize + FRAME_TRAILER_SIZE
                };
                Err(ArmLinkError::Truncated(format!(
                    "stream ended after {} of {} bytes",
                    src.len(),
                    expected
                )))
            }
        }
    }
}
