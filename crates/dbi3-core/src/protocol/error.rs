//! Protocol errors

use thiserror::Error;

use crate::rad26::Rad26Error;

/// Errors that can occur while talking to the DBI3
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("No DBI3 serial port found (USB VID:PID {vid:04x}:{pid:04x})")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("Cannot select a DBI3 serial port, multiple matches: {}", .ports.join(", "))]
    AmbiguousDevice { ports: Vec<String> },

    #[error("DBI3 not responding: {0}")]
    DeviceNotResponding(String),

    #[error("cmd:{command} expect:{allowed:?} got:{got}")]
    UnexpectedResponse {
        command: String,
        allowed: Vec<String>,
        got: String,
    },

    #[error("Timed out waiting for a response to '{0}'")]
    TimedOut(String),

    #[error("Response is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Identifier(#[from] Rad26Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        ProtocolError::SerialError(e.to_string())
    }
}
