use crate::{connect, ArmLinkResult, Connection, ConnectionInfo, IntoConnectionInfo};

/// The client acts as connector to the arm. By itself it does not do much
/// other than providing a convenient way to fetch a connection from it.
///
/// When opening a client, a serial port specification should be used:
///
/// ```plain
/// /dev/cu.usbmodem11301
/// /dev/ttyUSB0@115200
/// ```
///
/// Example usage::
///
/// ```rust,no_run
/// # async fn run() {
/// let client = armlink::Client::open("/dev/ttyUSB0@115200").unwrap();
/// let con = client.get_connection().await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    connection_info: ConnectionInfo,
}

impl Client {
    /// Creates a client for the given port specification. This does not
    /// actually open the port yet but it does perform some basic checks on
    /// the specification that might make the operation fail.
    pub fn open<T: IntoConnectionInfo>(params: T) -> ArmLinkResult<Self> {
        Ok(Self {
            connection_info: params.into_connection_info()?,
        })
    }

    /// Instructs the client to actually open the serial port and returns a
    /// connection object. The connection object can be used to send commands
    /// to the device. This can fail with a variety of errors (like a missing
    /// or busy device) so it's important that you handle those errors.
    pub async fn get_connection(&self) -> ArmLinkResult<Connection> {
        connect(&self.connection_info).await
    }

    /// Returns a reference of client connection info object.
    pub fn get_connection_info(&self) -> &ConnectionInfo {
        &self.connection_info
    }
}

#[cfg(test)]
mod tests {
    use super::Client;
    use crate::{ArmLinkError, ConnectionAddr, DEFAULT_BAUD_RATE};

    #[test]
    fn open_validates_eagerly() {
        let err = Client::open("/dev/ttyUSB0@slow").unwrap_err();
        assert!(matches!(err, ArmLinkError::InvalidClientConfig(_)));
    }

    #[test]
    fn open_keeps_connection_info() {
        let client = Client::open("/dev/ttyUSB0").unwrap();
        assert_eq!(
            client.get_connection_info().addr,
            ConnectionAddr::Serial("/dev/ttyUSB0".to_string(), DEFAULT_BAUD_RATE)
        );
    }
}
