use std::io;

pub use crate::client::Client;
pub use crate::cmd::{ClearAlarms, Command, QueryAlarmState, QueryVersion, RawCmd, Reboot};
pub use crate::codec::FrameCodec;
pub use crate::connection::{
    connect, AlarmSnapshot, ArmConnectionInfo, Connection, ConnectionAddr, ConnectionInfo,
    IntoConnectionInfo, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_SETTLE_DELAY,
};
pub use crate::discover::{discover, find_arm_port, CandidateReason, DeviceCandidate};
pub use crate::frame::{
    Frame, END_MARKER, FRAME_HEADER_SIZE, FRAME_TRAILER_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE,
    START_MARKER,
};
pub use crate::session::Session;

mod client;
mod cmd;
mod codec;
mod connection;
mod discover;
mod frame;
mod session;

/// Default baud rate of the arm's USB serial interface.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Generic library error type.
#[derive(thiserror::Error, Debug)]
pub enum ArmLinkError {
    /// No connection is established, or the connection was already shut down.
    #[error("transport not open")]
    TransportNotOpen,
    /// The received bytes do not start with the fixed frame marker.
    #[error("invalid frame header: expected [aa, aa], got {0:02x?}")]
    BadHeader([u8; 2]),
    /// The stream closed or timed out before the expected byte count was read.
    #[error("truncated frame: {0}")]
    Truncated(String),
    /// A frame field is out of range (e.g. payload too long).
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InvalidClientConfig(String),
    #[error(transparent)]
    Serial(#[from] tokio_serial::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialized library [`Result`] type.
///
/// [`Result`]: enum@std::result::Result
pub type ArmLinkResult<T> = std::result::Result<T, ArmLinkError>;
