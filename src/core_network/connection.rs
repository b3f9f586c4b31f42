// Narrow transport interface the protocol engine is written against.
//
// The engine never touches sockets. Connections only queue bytes and close,
// everything the network reports back arrives as a `SessionEvent`.

use std::fmt;
use std::io;
use thiserror::Error;

/// Identifies one passive transfer within a session. Events carrying the id
/// of a transfer that was already torn down are dropped.
pub type TransferId = u64;

/// One side of an established connection, exclusively owned.
pub trait Connection: Send {
    /// Hands bytes to the transport and returns how many it accepted. Data
    /// connections report consumption later through `SessionEvent::DataAcked`.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Flushes what was accepted, then closes. Further writes are refused.
    fn close(&mut self);
}

/// A listening endpoint for one passive data connection.
pub trait PassiveListener: Send {
    fn port(&self) -> u16;
    fn close(&mut self);
}

/// Creates passive listeners for a session.
pub trait DataTransport: Send {
    fn listen(
        &mut self,
        transfer: TransferId,
        port: u16,
    ) -> Result<Box<dyn PassiveListener>, TransportError>;
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind passive listener on port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("No async runtime available to drive the listener")]
    NoRuntime,
}

/// Notifications delivered to a session, one at a time.
pub enum SessionEvent {
    ControlData(Vec<u8>),
    ControlClosed,
    ControlTimeout,
    DataAccepted {
        transfer: TransferId,
        connection: Box<dyn Connection>,
    },
    DataReceived {
        transfer: TransferId,
        data: Vec<u8>,
    },
    DataAcked {
        transfer: TransferId,
        len: usize,
    },
    DataClosed {
        transfer: TransferId,
    },
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::ControlData(data) => write!(f, "ControlData({} bytes)", data.len()),
            SessionEvent::ControlClosed => write!(f, "ControlClosed"),
            SessionEvent::ControlTimeout => write!(f, "ControlTimeout"),
            SessionEvent::DataAccepted { transfer, .. } => {
                write!(f, "DataAccepted {{ transfer: {} }}", transfer)
            }
            SessionEvent::DataReceived { transfer, data } => write!(
                f,
                "DataReceived {{ transfer: {}, len: {} }}",
                transfer,
                data.len()
            ),
            SessionEvent::DataAcked { transfer, len } => {
                write!(f, "DataAcked {{ transfer: {}, len: {} }}", transfer, len)
            }
            SessionEvent::DataClosed { transfer } => {
                write!(f, "DataClosed {{ transfer: {} }}", transfer)
            }
        }
    }
}
