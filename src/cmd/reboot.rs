use std::fmt;

/// Command to reboot the device.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reboot;

impl Reboot {
    pub const ID: u8 = 0xCF;
}

impl fmt::Display for Reboot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "reboot")
    }
}
