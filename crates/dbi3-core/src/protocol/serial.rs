//! Serial port handling
//!
//! Port enumeration, DBI3 discovery by USB VID:PID, and opening the port with
//! the line settings the device expects.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProtocolError, DBI3_USB_PID, DBI3_USB_VID, DEFAULT_BAUD_RATE};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,

    /// USB serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Whether this port carries the DBI3's USB VID:PID
    pub fn is_dbi3(&self) -> bool {
        self.vid == Some(DBI3_USB_VID) && self.pid == Some(DBI3_USB_PID)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product, serial_number) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.product,
                usb_info.serial_number,
            ),
            _ => (None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
            serial_number,
        }
    }
}

/// List all available serial ports, sorted by name
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_else(|e| {
            warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        })
        .into_iter()
        .map(PortInfo::from)
        .collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports
}

/// Select the single DBI3 port from a port list
///
/// Fails when no port matches, or when more than one does since the
/// choice would be a guess.
pub fn find_device_port(ports: &[PortInfo]) -> Result<String, ProtocolError> {
    let matches: Vec<&PortInfo> = ports.iter().filter(|p| p.is_dbi3()).collect();

    match matches.as_slice() {
        [] => Err(ProtocolError::DeviceNotFound {
            vid: DBI3_USB_VID,
            pid: DBI3_USB_PID,
        }),
        [port] => {
            info!("DBI3 auto selected port {}", port.name);
            Ok(port.name.clone())
        }
        many => Err(ProtocolError::AmbiguousDevice {
            ports: many.iter().map(|p| p.name.clone()).collect(),
        }),
    }
}

/// Open a serial port with DBI3 settings
///
/// 8N1 with RTS/CTS hardware flow control, DTR asserted.
pub fn open_port(
    name: &str,
    baud_rate: Option<u32>,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    let baud = baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
    debug!("Opening {} at {} baud, timeout {:?}", name, baud, timeout);

    let mut port = serialport::new(name, baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::Hardware)
        .timeout(timeout)
        .open()
        .map_err(|e| ProtocolError::SerialError(format!("Failed to open {}: {}", name, e)))?;

    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("Failed to set DTR high on {}: {} (continuing)", name, e);
    }

    Ok(port)
}
