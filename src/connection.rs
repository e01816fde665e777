use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStream};
use tokio::io::{AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::time as tokio_time;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, instrument, warn};

use crate::cmd::{ClearAlarms, Command, QueryAlarmState, QueryVersion, RawCmd, Reboot};
use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::session::Session;
use crate::{ArmLinkError, ArmLinkResult, DEFAULT_BAUD_RATE};

/// How long to wait for a response frame before giving up.
///
/// Matches the read timeout the device is usually driven with; a device-busy
/// condition and a wiring fault both surface as the same timeout.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between opening the port and sending the first command. The arm's
/// USB serial interface drops bytes written immediately after open.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Pause after each response before the next command may be written.
const COMMAND_SPACING: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub(crate) struct SerialConnection {
    pub rw: SerialStream,
    pub open: bool,
}

/// Enumerations of actual raw connections.
#[derive(Debug)]
pub(crate) enum ActualConnection {
    Serial(SerialConnection),
}

impl ActualConnection {
    pub fn new(addr: &ConnectionAddr) -> ArmLinkResult<Self> {
        Ok(match *addr {
            ConnectionAddr::Serial(ref path, baud) => {
                let stream = tokio_serial::new(path.as_str(), baud).open_native_async()?;
                Self::Serial(SerialConnection {
                    rw: stream,
                    open: true,
                })
            }
        })
    }
}

#[derive(Debug)]
struct FramedSerialConnection {
    read: FramedRead<ReadHalf<SerialStream>, FrameCodec>,
    write: BufWriter<WriteHalf<SerialStream>>,

    open: bool,
}

#[derive(Debug)]
enum ActualFramedConnection {
    Serial(FramedSerialConnection),
}

impl ActualFramedConnection {
    /// Creates a new `ActualFramedConnection` from the actual connection `con`.
    fn new(con: ActualConnection) -> Self {
        match con {
            ActualConnection::Serial(SerialConnection { rw, open }) => {
                let (read, write) = tokio::io::split(rw);
                Self::Serial(FramedSerialConnection {
                    read: FramedRead::with_capacity(read, FrameCodec::new(), 1024),
                    write: BufWriter::with_capacity(255, write),
                    open,
                })
            }
        }
    }

    pub async fn flush(&mut self) -> ArmLinkResult<()> {
        match self {
            Self::Serial(FramedSerialConnection { ref mut write, .. }) => write.flush().await?,
        }

        Ok(())
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> ArmLinkResult<()> {
        match self {
            Self::Serial(FramedSerialConnection { ref mut write, .. }) => {
                write.write_all(buf).await?
            }
        }

        Ok(())
    }

    pub async fn shutdown(&mut self) -> ArmLinkResult<()> {
        match self {
            Self::Serial(FramedSerialConnection {
                ref mut write,
                ref mut open,
                ..
            }) => {
                _ = write.shutdown().await;
                *open = false;
            }
        }

        Ok(())
    }

    pub fn is_open(&self) -> bool {
        match self {
            Self::Serial(FramedSerialConnection { ref open, .. }) => *open,
        }
    }
}

/// Stateful framed connection encapsulating the actual connection.
///
/// Writes command frames and reads response frames, one exchange at a time.
#[derive(Debug)]
pub(crate) struct FramedConnection {
    con: ActualFramedConnection,
    session: Session,

    response_timeout: Option<Duration>,
}

impl FramedConnection {
    /// Creates a new `FramedConnection`, backed by the actual connection `con`.
    pub fn new(con: ActualConnection, response_timeout: Option<Duration>) -> Self {
        Self {
            con: ActualFramedConnection::new(con),
            session: Session::new(),
            response_timeout,
        }
    }

    /// Returns whether the connection is open.
    pub fn is_open(&self) -> bool {
        self.con.is_open()
    }

    /// Returns the sequence number the next command will carry.
    pub fn next_sequence(&self) -> u8 {
        self.session.peek()
    }

    /// Writes the command under the session's current sequence number and
    /// reads the response frame.
    ///
    /// The sequence counter advances once the command is on the wire, whether
    /// or not a response ever arrives. Responses are not matched against the
    /// sent sequence number.
    pub async fn send_command(&mut self, cmd: &Command) -> ArmLinkResult<Frame> {
        if !self.con.is_open() {
            return Err(ArmLinkError::TransportNotOpen);
        }

        let frame = cmd.to_frame(self.session.peek())?;

        debug!("sending command: '{}' (seq: {})", cmd, frame.sequence());
        self.con.write_all(&frame.encode()).await?;
        self.con.flush().await?;
        self.session.advance();

        let resp = self.read_frame().await?;
        if !resp.checksum_ok() {
            warn!(
                "response checksum mismatch (cmd: 0x{:02x}, seq: {})",
                resp.command_id(),
                resp.sequence()
            );
        }

        // the device needs breathing room between commands
        tokio_time::sleep(COMMAND_SPACING).await;

        Ok(resp)
    }

    /// Low level function which reads a `Frame` from the underlying actual
    /// framed connection.
    pub async fn read_frame(&mut self) -> ArmLinkResult<Frame> {
        match &mut self.con {
            ActualFramedConnection::Serial(FramedSerialConnection { ref mut read, .. }) => {
                let frame = match self.response_timeout {
                    Some(timeout) => match tokio_time::timeout(timeout, read.next()).await {
                        Ok(frame) => frame,
                        Err(_) => {
                            return Err(ArmLinkError::Truncated(format!(
                                "no response within {:?}",
                                timeout
                            )));
                        }
                    },
                    None => read.next().await,
                };

                if let Some(frame) = frame {
                    return frame;
                }
            }
        }

        Err(io::Error::new(io::ErrorKind::BrokenPipe, "disconnected").into())
    }

    /// Performs a connection shutdown.
    pub async fn shutdown(&mut self) -> ArmLinkResult<()> {
        self.con.shutdown().await
    }
}

/// One alarm-state observation.
///
/// An owned snapshot handed from the polling producer to its readers; the
/// state bytes are raw device output with no documented layout.
#[derive(Debug, Clone)]
pub struct AlarmSnapshot {
    /// Sequence number the response frame carried.
    pub sequence: u8,
    /// Raw alarm-state payload.
    pub state: Bytes,
    /// Whether the response checksum matched.
    pub checksum_ok: bool,
}

/// Represents a stateful connection to the arm.
///
/// One command is in flight at a time: a command frame is written, then the
/// caller blocks reading the response before the next command may be sent.
/// There is no retry, no automatic reconnection, and no acknowledgment
/// matching between sent and received sequence numbers.
#[derive(Debug)]
pub struct Connection {
    con: FramedConnection,
}

impl Connection {
    pub(crate) fn new(con: FramedConnection) -> Self {
        Self { con }
    }

    /// Returns whether the connection is open.
    pub fn is_open(&self) -> bool {
        self.con.is_open()
    }

    /// Returns the sequence number the next command will carry.
    pub fn next_sequence(&self) -> u8 {
        self.con.next_sequence()
    }

    /// Sends a command and returns the full response frame.
    #[instrument(skip(self))]
    pub async fn send(&mut self, cmd: &Command) -> ArmLinkResult<Frame> {
        self.con.send_command(cmd).await
    }

    /// Queries the device's firmware version and returns the raw response
    /// payload.
    #[instrument(skip(self))]
    pub async fn query_version_raw(&mut self) -> ArmLinkResult<Bytes> {
        self.send(&Command::QueryVersion(QueryVersion))
            .await
            .map(|frame| frame.payload_bytes())
    }

    /// Queries the device's alarm state and returns the raw response payload.
    ///
    /// The payload's alarm layout is undocumented; interpretation is up to
    /// the caller.
    #[instrument(skip(self))]
    pub async fn query_alarm_state_raw(&mut self) -> ArmLinkResult<Bytes> {
        self.send(&Command::QueryAlarmState(QueryAlarmState))
            .await
            .map(|frame| frame.payload_bytes())
    }

    /// Clears all active alarms and returns the response frame.
    #[instrument(skip(self))]
    pub async fn clear_alarms(&mut self) -> ArmLinkResult<Frame> {
        self.send(&Command::ClearAlarms(ClearAlarms)).await
    }

    /// Reboots the device and returns the response frame.
    #[instrument(skip(self))]
    pub async fn reboot(&mut self) -> ArmLinkResult<Frame> {
        self.send(&Command::Reboot(Reboot)).await
    }

    /// Sends an arbitrary command id with an opaque payload and returns the
    /// response frame.
    #[instrument(skip(self, payload))]
    pub async fn send_raw(
        &mut self,
        command_id: u8,
        payload: impl Into<Bytes>,
    ) -> ArmLinkResult<Frame> {
        self.send(&Command::Raw(RawCmd::new(command_id, payload)))
            .await
    }

    /// Returns a stream re-querying the alarm state every `interval` and
    /// yielding owned [`AlarmSnapshot`] values. A zero interval is rejected
    /// with `InvalidArgument`.
    ///
    /// The stream takes the connection by value; alarm status flows to
    /// readers exclusively through the yielded snapshots.
    pub fn alarm_snapshots(
        self,
        interval: Duration,
    ) -> ArmLinkResult<impl TryStream<Item = ArmLinkResult<AlarmSnapshot>>> {
        validate_snapshot_interval(interval)?;
        let ticker = tokio_time::interval(interval);

        Ok(stream::try_unfold((self, ticker), |(mut con, mut ticker)| async move {
            ticker.tick().await;

            let resp = con
                .send(&Command::QueryAlarmState(QueryAlarmState))
                .await?;
            let snapshot = AlarmSnapshot {
                sequence: resp.sequence(),
                checksum_ok: resp.checksum_ok(),
                state: resp.payload_bytes(),
            };

            Ok(Some((snapshot, (con, ticker))))
        }))
    }

    /// Performs a connection shutdown. Subsequent sends fail with
    /// `TransportNotOpen`; there is no reconnection.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> ArmLinkResult<()> {
        self.con.shutdown().await
    }
}

/// Defines the connection address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionAddr {
    /// Format for this is `(path, baud_rate)`.
    Serial(String, u32),
}

impl fmt::Display for ConnectionAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConnectionAddr::Serial(ref path, baud) => write!(f, "{path}@{baud}"),
        }
    }
}

/// Holds the connection information used for connecting to the arm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// A connection address for where to connect to.
    pub addr: ConnectionAddr,

    /// Arm specific connection information.
    pub arm: ArmConnectionInfo,
}

/// Arm specific/transport independent information used to establish a
/// connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArmConnectionInfo {
    /// Read timeout applied while waiting for a response frame. `None` waits
    /// indefinitely.
    pub response_timeout: Option<Duration>,
    /// Delay between opening the port and the connection becoming usable.
    pub settle_delay: Option<Duration>,
}

impl Default for ArmConnectionInfo {
    fn default() -> Self {
        Self {
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            settle_delay: Some(DEFAULT_SETTLE_DELAY),
        }
    }
}

impl FromStr for ConnectionInfo {
    type Err = ArmLinkError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.into_connection_info()
    }
}

/// Converts an object into a connection info struct. This allows the
/// constructor of the client to accept connection information in a
/// range of different formats.
pub trait IntoConnectionInfo {
    /// Converts the object into a connection info object.
    fn into_connection_info(self) -> ArmLinkResult<ConnectionInfo>;
}

impl IntoConnectionInfo for ConnectionInfo {
    fn into_connection_info(self) -> ArmLinkResult<ConnectionInfo> {
        Ok(self)
    }
}

impl<'a> IntoConnectionInfo for &'a str {
    fn into_connection_info(self) -> ArmLinkResult<ConnectionInfo> {
        parse_port_spec(self)
    }
}

impl IntoConnectionInfo for String {
    fn into_connection_info(self) -> ArmLinkResult<ConnectionInfo> {
        parse_port_spec(&self)
    }
}

impl<T> IntoConnectionInfo for (T, u32)
where
    T: Into<String>,
{
    fn into_connection_info(self) -> ArmLinkResult<ConnectionInfo> {
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Serial(self.0.into(), self.1),
            arm: ArmConnectionInfo::default(),
        })
    }
}

fn validate_snapshot_interval(interval: Duration) -> ArmLinkResult<()> {
    if interval.is_zero() {
        return Err(ArmLinkError::InvalidArgument(
            "snapshot interval must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Parses a port specification of the form `path` or `path@baud`, e.g.
/// `/dev/ttyUSB0` or `/dev/cu.usbmodem11301@115200`.
fn parse_port_spec(spec: &str) -> ArmLinkResult<ConnectionInfo> {
    let (path, baud) = match spec.rsplit_once('@') {
        Some((path, baud_str)) => {
            let baud = baud_str.parse::<u32>().map_err(|_| {
                ArmLinkError::InvalidClientConfig(format!("invalid baud rate: {}", baud_str))
            })?;
            (path, baud)
        }
        None => (spec, DEFAULT_BAUD_RATE),
    };

    if path.is_empty() {
        return Err(ArmLinkError::InvalidClientConfig(
            "missing serial port path".to_string(),
        ));
    }

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Serial(path.to_string(), baud),
        arm: ArmConnectionInfo::default(),
    })
}

/// Opens the serial port described by `connection_info` and returns a usable
/// [`Connection`].
///
/// The port is a scoped resource: acquired here, released on shutdown (or
/// drop). A settle delay is waited out before the connection is handed back.
pub async fn connect(connection_info: &ConnectionInfo) -> ArmLinkResult<Connection> {
    debug!("opening serial port: {}", connection_info.addr);
    let con = ActualConnection::new(&connection_info.addr)?;

    if let Some(settle_delay) = connection_info.arm.settle_delay {
        debug!("waiting {:?} for the device to settle", settle_delay);
        tokio_time::sleep(settle_delay).await;
    }

    let con = FramedConnection::new(con, connection_info.arm.response_timeout);

    Ok(Connection::new(con))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn snapshot_interval_zero_is_invalid() {
        assert!(matches!(
            validate_snapshot_interval(Duration::ZERO),
            Err(ArmLinkError::InvalidArgument(_))
        ));
        assert!(validate_snapshot_interval(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn parse_path_only() {
        let info: ConnectionInfo = "/dev/cu.usbmodem11301".parse().unwrap();
        assert_eq!(
            info.addr,
            ConnectionAddr::Serial("/dev/cu.usbmodem11301".to_string(), DEFAULT_BAUD_RATE)
        );
        assert_eq!(info.arm, ArmConnectionInfo::default());
    }

    #[test]
    fn parse_path_with_baud() {
        let info: ConnectionInfo = "/dev/ttyUSB0@9600".parse().unwrap();
        assert_eq!(
            info.addr,
            ConnectionAddr::Serial("/dev/ttyUSB0".to_string(), 9600)
        );
    }

    #[test]
    fn parse_windows_port() {
        let info: ConnectionInfo = "COM3".parse().unwrap();
        assert_eq!(
            info.addr,
            ConnectionAddr::Serial("COM3".to_string(), DEFAULT_BAUD_RATE)
        );
    }

    #[test]
    fn parse_invalid_baud() {
        let err = "/dev/ttyUSB0@fast".parse::<ConnectionInfo>().unwrap_err();
        assert!(matches!(err, ArmLinkError::InvalidClientConfig(_)));
    }

    #[test]
    fn parse_empty_path() {
        let err = "@115200".parse::<ConnectionInfo>().unwrap_err();
        assert!(matches!(err, ArmLinkError::InvalidClientConfig(_)));
    }

    #[test]
    fn tuple_into_connection_info() {
        let info = ("COM3", 57600).into_connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Serial("COM3".to_string(), 57600));
    }

    #[test]
    fn addr_display() {
        let addr = ConnectionAddr::Serial("/dev/ttyUSB0".to_string(), 115_200);
        assert_eq!(addr.to_string(), "/dev/ttyUSB0@115200");
    }
}
