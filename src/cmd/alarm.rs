use std::fmt;

/// Command to query the device's active alarm state.
///
/// The response payload is an opaque byte string; the alarm bit layout is
/// not documented by the vendor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryAlarmState;

impl QueryAlarmState {
    pub const ID: u8 = 0x81;
}

impl fmt::Display for QueryAlarmState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "alarm-state")
    }
}

/// Command to clear all active alarms.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClearAlarms;

impl ClearAlarms {
    pub const ID: u8 = 0x8A;
}

impl fmt::Display for ClearAlarms {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "clear-alarms")
    }
}
