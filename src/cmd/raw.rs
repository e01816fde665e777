use std::fmt;

use bytes::Bytes;

/// An arbitrary command with an opaque payload.
///
/// Escape hatch for the many vendor command ids this library does not model.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawCmd {
    command_id: u8,
    payload: Bytes,
}

impl RawCmd {
    pub fn new(command_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command_id,
            payload: payload.into(),
        }
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl fmt::Display for RawCmd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "raw 0x{:02x} ({} byte payload)",
            self.command_id,
            self.payload.len()
        )
    }
}
