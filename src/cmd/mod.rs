use std::fmt;

pub use alarm::{ClearAlarms, QueryAlarmState};
pub use raw::RawCmd;
pub use reboot::Reboot;
pub use version::QueryVersion;

use bytes::Bytes;

use crate::frame::Frame;
use crate::ArmLinkResult;

mod alarm;
mod raw;
mod reboot;
mod version;

/// The command ids observed in use on the arm's serial link.
///
/// These are undocumented vendor constants copied from traffic, not a
/// verified contract; [`Command::Raw`] covers everything else.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    QueryVersion(QueryVersion),
    QueryAlarmState(QueryAlarmState),
    ClearAlarms(ClearAlarms),
    Reboot(Reboot),
    Raw(RawCmd),
}

impl Command {
    /// Returns the wire command id.
    pub fn command_id(&self) -> u8 {
        match self {
            Self::QueryVersion(_) => QueryVersion::ID,
            Self::QueryAlarmState(_) => QueryAlarmState::ID,
            Self::ClearAlarms(_) => ClearAlarms::ID,
            Self::Reboot(_) => Reboot::ID,
            Self::Raw(cmd) => cmd.command_id(),
        }
    }

    /// Returns the command payload.
    pub fn payload(&self) -> Bytes {
        match self {
            Self::Raw(cmd) => cmd.payload().clone(),
            _ => Bytes::new(),
        }
    }

    /// Builds the wire frame carrying this command under the given sequence
    /// number.
    pub fn to_frame(&self, sequence: u8) -> ArmLinkResult<Frame> {
        Frame::new(self.command_id(), sequence, self.payload())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let serialized = match self {
            Self::QueryVersion(cmd) => cmd.to_string(),
            Self::QueryAlarmState(cmd) => cmd.to_string(),
            Self::ClearAlarms(cmd) => cmd.to_string(),
            Self::Reboot(cmd) => cmd.to_string(),
            Self::Raw(cmd) => cmd.to_string(),
        };
        write!(f, "{}", serialized)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_ids() {
        assert_eq!(Command::QueryVersion(QueryVersion).command_id(), 0x01);
        assert_eq!(Command::QueryAlarmState(QueryAlarmState).command_id(), 0x81);
        assert_eq!(Command::ClearAlarms(ClearAlarms).command_id(), 0x8A);
        assert_eq!(Command::Reboot(Reboot).command_id(), 0xCF);
        assert_eq!(Command::Raw(RawCmd::new(0x42, Bytes::new())).command_id(), 0x42);
    }

    #[test]
    fn to_frame_stamps_sequence() {
        let cmd = Command::ClearAlarms(ClearAlarms);
        let frame = cmd.to_frame(0x00).unwrap();

        assert_eq!(
            frame.encode().as_ref(),
            &[0xAA, 0xAA, 0x02, 0x8A, 0x00, 0x8C, 0x0D, 0x0A]
        );
    }

    #[test]
    fn raw_command_carries_payload() {
        let cmd = Command::Raw(RawCmd::new(0x1F, vec![0xDE, 0xAD]));
        let frame = cmd.to_frame(0x09).unwrap();

        assert_eq!(frame.command_id(), 0x1F);
        assert_eq!(frame.sequence(), 0x09);
        assert_eq!(frame.payload(), &[0xDE, 0xAD]);
    }
}
