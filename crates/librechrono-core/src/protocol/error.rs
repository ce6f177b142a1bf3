//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
///
/// A device-reported timeout is NOT an error: it comes back as
/// [`Measurement::TimedOut`](super::Measurement::TimedOut). This enum covers
/// transport and framing failures only.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Response timeout")]
    Timeout,

    #[error("Not connected to rig")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Invalid response from rig")]
    InvalidResponse,

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
