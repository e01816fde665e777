use std::fmt;

use serde::Serialize;
use tokio_serial::{available_ports, SerialPortInfo, SerialPortType};
use tracing::debug;

use crate::ArmLinkResult;

/// Product/description markers of USB serial bridges the arm has been seen
/// behind.
const DESCRIPTION_MARKERS: [&str; 3] = ["USB-SERIAL", "Dobot", "CH340"];

/// Why a serial port was ranked as a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateReason {
    /// The port name looks like a USB modem device (macOS convention).
    UsbModemDevice,
    /// The port's product string matches a known USB serial bridge.
    MatchingDescription,
    /// Nothing matched; every remaining port is offered as a fallback.
    Fallback,
}

impl fmt::Display for CandidateReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            CandidateReason::UsbModemDevice => "USB modem device (likely)",
            CandidateReason::MatchingDescription => "matching description",
            CandidateReason::Fallback => "fallback",
        };
        write!(f, "{}", reason)
    }
}

/// A serial port that might be the arm, with whatever USB metadata the
/// enumeration turned up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCandidate {
    pub port_name: String,
    pub reason: CandidateReason,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl DeviceCandidate {
    fn new(port: &SerialPortInfo, reason: CandidateReason) -> Self {
        let mut candidate = Self {
            port_name: port.port_name.clone(),
            reason,
            vid: None,
            pid: None,
            serial_number: None,
            manufacturer: None,
            product: None,
        };

        if let SerialPortType::UsbPort(ref usb) = port.port_type {
            candidate.vid = Some(usb.vid);
            candidate.pid = Some(usb.pid);
            candidate.serial_number = usb.serial_number.clone();
            candidate.manufacturer = usb.manufacturer.clone();
            candidate.product = usb.product.clone();
        }

        candidate
    }
}

/// Lists the serial ports that might be the arm, best candidates first.
///
/// Ranking: USB-modem-style port names, then ports whose product string
/// matches a known bridge, then all remaining ports as a fallback. The
/// result is empty only when no serial ports exist at all.
pub fn discover() -> ArmLinkResult<Vec<DeviceCandidate>> {
    let ports = available_ports()?;
    debug!("enumerated {} serial port(s)", ports.len());

    Ok(candidates_from(&ports))
}

/// Returns the best candidate's port path, if any port exists.
pub fn find_arm_port() -> ArmLinkResult<Option<String>> {
    Ok(discover()?.first().map(|c| c.port_name.clone()))
}

pub(crate) fn candidates_from(ports: &[SerialPortInfo]) -> Vec<DeviceCandidate> {
    let mut candidates: Vec<DeviceCandidate> = vec![];

    for port in ports {
        if port.port_name.contains("usbmodem") {
            push_unique(
                &mut candidates,
                DeviceCandidate::new(port, CandidateReason::UsbModemDevice),
            );
        }
    }

    for port in ports {
        if product_of(port)
            .map(|product| DESCRIPTION_MARKERS.iter().any(|m| product.contains(m)))
            .unwrap_or(false)
        {
            push_unique(
                &mut candidates,
                DeviceCandidate::new(port, CandidateReason::MatchingDescription),
            );
        }
    }

    if candidates.is_empty() {
        for port in ports {
            push_unique(
                &mut candidates,
                DeviceCandidate::new(port, CandidateReason::Fallback),
            );
        }
    }

    candidates
}

fn push_unique(candidates: &mut Vec<DeviceCandidate>, candidate: DeviceCandidate) {
    if !candidates
        .iter()
        .any(|c| c.port_name == candidate.port_name)
    {
        candidates.push(candidate);
    }
}

fn product_of(port: &SerialPortInfo) -> Option<&str> {
    match port.port_type {
        SerialPortType::UsbPort(ref usb) => usb.product.as_deref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio_serial::{SerialPortInfo, SerialPortType, UsbPortInfo};

    use super::*;

    fn usb_port(name: &str, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x1A86,
                pid: 0x7523,
                serial_number: None,
                manufacturer: None,
                product: product.map(|p| p.to_string()),
            }),
        }
    }

    fn plain_port(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn usb_modem_ports_rank_first() {
        let ports = vec![
            plain_port("/dev/ttyS0"),
            usb_port("/dev/cu.usbmodem11301", None),
            usb_port("/dev/ttyUSB0", Some("USB-SERIAL CH340")),
        ];

        let candidates = candidates_from(&ports);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].port_name, "/dev/cu.usbmodem11301");
        assert_eq!(candidates[0].reason, CandidateReason::UsbModemDevice);
        assert_eq!(candidates[1].port_name, "/dev/ttyUSB0");
        assert_eq!(candidates[1].reason, CandidateReason::MatchingDescription);
    }

    #[test]
    fn falls_back_to_all_ports() {
        let ports = vec![plain_port("/dev/ttyS0"), plain_port("/dev/ttyS1")];

        let candidates = candidates_from(&ports);
        assert_eq!(candidates.len(), 2);
        assert!(candidates
            .iter()
            .all(|c| c.reason == CandidateReason::Fallback));
    }

    #[test]
    fn no_duplicate_ports() {
        // a usbmodem port whose product string also matches a marker
        let ports = vec![usb_port("/dev/cu.usbmodem11301", Some("Dobot Magician"))];

        let candidates = candidates_from(&ports);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reason, CandidateReason::UsbModemDevice);
    }

    #[test]
    fn no_ports_no_candidates() {
        assert_eq!(candidates_from(&[]), vec![]);
    }

    #[test]
    fn candidate_carries_usb_metadata() {
        let ports = vec![usb_port("/dev/ttyUSB0", Some("CH340 serial"))];

        let candidates = candidates_from(&ports);
        assert_eq!(candidates[0].vid, Some(0x1A86));
        assert_eq!(candidates[0].pid, Some(0x7523));
        assert_eq!(candidates[0].product.as_deref(), Some("CH340 serial"));
    }
}
