use std::fmt;

/// Command to query the device's firmware version.
///
/// Used as a liveness probe; the response payload layout is not documented
/// by the vendor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryVersion;

impl QueryVersion {
    pub const ID: u8 = 0x01;
}

impl fmt::Display for QueryVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "version")
    }
}
