//! DBI3 Serial Protocol
//!
//! Implements the DBI3 text command line interface spoken over its USB
//! serial port.
//!
//! Commands are ASCII text terminated by `\r`. Responses are lines terminated
//! by `\n\r`, the reverse of the usual order. Several commands (`fs list`,
//! `fs read`, `fs del`) give no end-of-output marker, so the session follows
//! them with the no-op `md mach` and treats its `ok`/`nok` as the end of the
//! block.

pub mod commands;
mod error;
pub mod reader;
pub mod serial;
mod session;
pub mod stream;

pub use commands::{Command, ConfigCommand, ConfigKind, CONFIG_COMMANDS};
pub use error::ProtocolError;
pub use reader::{LineReader, ReadLine};
pub use serial::{find_device_port, list_ports, open_port, PortInfo};
pub use session::{
    ConfigSetting, DeviceConfigReport, DownloadOutcome, Session, SessionConfig, SubSetting,
};
pub use stream::{CommunicationChannel, SerialChannel};

/// Baud rate of the DBI3 serial interface
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default per-read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Timeout for the sentinel following `fs del`, the device is slow to acknowledge
pub const DELETE_TIMEOUT_MS: u64 = 20_000;

/// Largest single read from the serial port
pub const READ_CHUNK_SIZE: usize = 2048;

/// USB vendor ID of the DBI3 (FTDI FT230X)
pub const DBI3_USB_VID: u16 = 0x0403;

/// USB product ID of the DBI3 (FTDI FT230X)
pub const DBI3_USB_PID: u16 = 0x6015;
