mod common;

use common::{init_tracing, ChunkedChannel, ScriptedDevice};
use dbi3_core::protocol::{
    find_device_port, LineReader, PortInfo, ProtocolError, ReadLine, Session, SessionConfig,
    DBI3_USB_PID, DBI3_USB_VID,
};
use pretty_assertions::assert_eq;

fn connect(device: ScriptedDevice) -> Result<Session<ScriptedDevice>, ProtocolError> {
    Session::connect(device, SessionConfig::default())
}

fn line(text: &str) -> ReadLine {
    ReadLine::Line(text.to_string())
}

#[test]
fn test_lines_at_every_split_point() {
    let stream = b"abc\n\rdef\n\r";
    for split in 0..=stream.len() {
        let (head, tail) = stream.split_at(split);
        let mut reader = LineReader::new(ChunkedChannel::new(&[head, tail]));
        assert_eq!(reader.read_line().unwrap(), line("abc"), "split at {}", split);
        assert_eq!(reader.read_line().unwrap(), line("def"), "split at {}", split);
        assert_eq!(reader.read_line().unwrap(), ReadLine::TimedOut);
    }
}

#[test]
fn test_many_lines_in_one_read() {
    let mut reader = LineReader::new(ChunkedChannel::new(&[b"ok\n\rnok\n\rSN11005\n\r"]));
    assert_eq!(reader.read_line().unwrap(), line("ok"));
    assert_eq!(reader.read_line().unwrap(), line("nok"));
    assert_eq!(reader.read_line().unwrap(), line("SN11005"));
}

#[test]
fn test_invalid_utf8_is_an_error() {
    let mut reader = LineReader::new(ChunkedChannel::new(&[b"\xff\xfe\n\r"]));
    assert!(matches!(
        reader.read_line(),
        Err(ProtocolError::Encoding(_))
    ));
}

#[test]
fn test_bring_up_sequence() {
    init_tracing();
    let device = ScriptedDevice::new().idle().on("sn", &["SN11005"]);
    let session = connect(device).unwrap();

    assert_eq!(session.serial_number(), "SN11005");
    let device = session.into_channel();
    assert_eq!(device.sent, vec!["fs stop", "md mach", "sn"]);
}

#[test]
fn test_silent_device_is_not_responding() {
    let device = ScriptedDevice::new().idle().on("sn", &[]);
    assert!(matches!(
        connect(device),
        Err(ProtocolError::DeviceNotResponding(_))
    ));
}

#[test]
fn test_nok_accepted_for_fs_stop() {
    let device = ScriptedDevice::new()
        .on("fs stop", &["nok"])
        .on("md mach", &["ok"])
        .on("sn", &["SN11005"]);
    assert!(connect(device).is_ok());
}

#[test]
fn test_wrong_idle_response() {
    let device = ScriptedDevice::new()
        .on("fs stop", &["ok"])
        .on("md mach", &["error"]);
    match connect(device) {
        Err(ProtocolError::UnexpectedResponse { command, got, .. }) => {
            assert_eq!(command, "md mach");
            assert_eq!(got, "error");
        }
        Err(e) => panic!("Expected UnexpectedResponse, got: {:?}", e),
        Ok(_) => panic!("Expected UnexpectedResponse, got a session"),
    }
}

#[test]
fn test_list_logs_stops_at_sentinel() {
    let device = ScriptedDevice::new()
        .idle()
        .on("sn", &["SN11005"])
        .idle()
        .on("fs list", &["BKXQWDA BKXQXAA", "BKXRAAA BKXRBCD"])
        .on("md mach", &["ok"]);
    let mut session = connect(device).unwrap();

    let lines = session.list_logs().unwrap();
    assert_eq!(lines, vec!["BKXQWDA BKXQXAA", "BKXRAAA BKXRBCD"]);
    assert_eq!(session.into_channel().pending_commands(), 0);
}

#[test]
fn test_delete_log() {
    let device = ScriptedDevice::new()
        .idle()
        .on("sn", &["SN11005"])
        .idle()
        .on("fs del BKXQWDA", &[])
        .on("md mach", &["ok"]);
    let mut session = connect(device).unwrap();

    session.delete_log("BKXQWDA").unwrap();
    assert_eq!(
        session.into_channel().sent[3..],
        ["fs stop", "md mach", "fs del BKXQWDA", "md mach"]
    );
}

#[test]
fn test_device_discovery() {
    let port = |name: &str, vid, pid| PortInfo {
        name: name.to_string(),
        vid: Some(vid),
        pid: Some(pid),
        product: None,
        serial_number: None,
    };

    let ports = vec![
        port("/dev/ttyUSB0", 0x10c4, 0xea60),
        port("/dev/ttyUSB1", DBI3_USB_VID, DBI3_USB_PID),
    ];
    assert_eq!(find_device_port(&ports).unwrap(), "/dev/ttyUSB1");

    assert!(matches!(
        find_device_port(&ports[..1]),
        Err(ProtocolError::DeviceNotFound { .. })
    ));

    let two = vec![
        port("/dev/ttyUSB1", DBI3_USB_VID, DBI3_USB_PID),
        port("/dev/ttyUSB2", DBI3_USB_VID, DBI3_USB_PID),
    ];
    assert!(matches!(
        find_device_port(&two),
        Err(ProtocolError::AmbiguousDevice { .. })
    ));
}

#[test]
#[ignore = "requires a DBI3 connected over USB"]
fn test_hardware_bring_up() {
    init_tracing();
    let mut session = Session::open(SessionConfig::default()).unwrap();
    assert!(session.serial_number().starts_with("SN"));
    let report = session.device_config().unwrap();
    assert!(!report.lines.is_empty());
}
