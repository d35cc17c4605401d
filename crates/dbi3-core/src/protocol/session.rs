//! Command session
//!
//! Owns the serial channel for the lifetime of a connection to one DBI3,
//! issues commands and validates their responses.

use serde::Serialize;
use std::fs::File;
use std::io::{LineWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::commands::{is_sentinel, RESP_ANY, RESP_OK};
use super::reader::is_timeout;
use super::{
    find_device_port, list_ports, open_port, Command, CommunicationChannel, ConfigKind,
    LineReader, ProtocolError, ReadLine, SerialChannel, CONFIG_COMMANDS, DEFAULT_BAUD_RATE,
    DEFAULT_TIMEOUT_MS, DELETE_TIMEOUT_MS, READ_CHUNK_SIZE,
};
use crate::config::AppConfig;

/// Column where sub-command descriptions start in the configuration report
const REPORT_DESCRIPTION_COLUMN: usize = 18;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Serial port name; discovered by USB VID:PID when `None`
    pub port_name: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout
    pub timeout: Duration,
    /// Timeout for the acknowledgement of `fs del`
    pub delete_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            delete_timeout: Duration::from_millis(DELETE_TIMEOUT_MS),
        }
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            port_name: config.com_port.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            ..Self::default()
        }
    }
}

/// Result of downloading one log
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// The log was written to `path`
    Downloaded {
        /// Where the log was written
        path: PathBuf,
        /// Lines written
        records: usize,
        /// Time taken
        elapsed: Duration,
    },
    /// The device returned no log lines; no file was created
    Empty,
}

/// One value of the configuration report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSetting {
    /// Report heading
    pub description: String,
    /// Value of a single-line query
    pub value: Option<String>,
    /// Values of sub-command queries, in query order
    pub subcommands: Vec<SubSetting>,
    /// Lines of a multi-line query
    pub multivalue: Vec<String>,
}

/// Value of one sub-command query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubSetting {
    /// Sub-command name
    pub name: String,
    /// Reported value
    pub value: String,
    /// Label shown in the report
    pub description: Option<String>,
}

/// The device configuration, as report lines and structured values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceConfigReport {
    /// Formatted report
    pub lines: Vec<String>,
    /// Values by base command, in query order
    pub settings: Vec<(String, ConfigSetting)>,
}

/// A command session with one DBI3
pub struct Session<C = SerialChannel> {
    reader: LineReader<C>,
    serial_number: String,
    config: SessionConfig,
}

impl Session<SerialChannel> {
    /// Open the configured (or discovered) port and bring the device up
    pub fn open(config: SessionConfig) -> Result<Self, ProtocolError> {
        let port_name = match &config.port_name {
            Some(name) => name.clone(),
            None => find_device_port(&list_ports())?,
        };
        let port = open_port(&port_name, Some(config.baud_rate), config.timeout)?;
        Self::connect(SerialChannel::new(port), config)
    }
}

impl<C: CommunicationChannel> Session<C> {
    /// Bring up a session over an already open channel
    ///
    /// Drains stale output, puts the device in a known idle state and reads
    /// its serial number.
    pub fn connect(mut channel: C, config: SessionConfig) -> Result<Self, ProtocolError> {
        channel.set_timeout(config.timeout)?;

        let mut session = Self {
            reader: LineReader::new(channel),
            serial_number: String::new(),
            config,
        };

        session.flush_stale()?;
        session.reset()?;
        session.serial_number = session.read_serial_number()?;
        info!("Connected to DBI3 {}", session.serial_number);

        Ok(session)
    }

    /// Device serial number, e.g. `SN11005`
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Access the underlying channel
    pub fn channel_mut(&mut self) -> &mut C {
        self.reader.get_mut()
    }

    /// Close the session, returning the channel
    pub fn into_channel(self) -> C {
        self.reader.into_inner()
    }

    /// Send a command and require its single response line to be one of `allowed`
    pub fn send_and_expect(
        &mut self,
        command: &Command,
        allowed: &[&str],
    ) -> Result<String, ProtocolError> {
        self.write_command(&command.wire())?;

        let got = self
            .reader
            .read_line()?
            .into_line()
            .ok_or_else(|| ProtocolError::TimedOut(command.text()))?;

        if allowed.contains(&got.as_str()) {
            Ok(got)
        } else {
            Err(ProtocolError::UnexpectedResponse {
                command: command.text(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
                got,
            })
        }
    }

    /// Stop any logging activity and confirm the command line is idle
    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        self.send_and_expect(&Command::FsStop, RESP_ANY)?;
        self.send_and_expect(&Command::MdMach, RESP_OK)?;
        Ok(())
    }

    /// Send a command and return its single response line unvalidated
    ///
    /// A timeout yields an empty string.
    pub fn query(&mut self, command: &Command) -> Result<String, ProtocolError> {
        self.write_command(&command.wire())?;
        Ok(self.reader.read_line()?.into_line().unwrap_or_default())
    }

    /// Send a command followed by the sentinel and pass each output line to `f`
    ///
    /// Blank lines are skipped; the sentinel response is not passed on.
    /// Returns the number of lines passed to `f`.
    pub fn for_each_block_line<F>(&mut self, command: &Command, mut f: F) -> Result<usize, ProtocolError>
    where
        F: FnMut(String) -> Result<(), ProtocolError>,
    {
        self.write_command(&command.wire_with_sentinel())?;

        let mut count = 0;
        loop {
            match self.reader.read_line()? {
                ReadLine::Line(line) if is_sentinel(&line) => return Ok(count),
                ReadLine::Line(line) if line.is_empty() => continue,
                ReadLine::Line(line) => {
                    f(line)?;
                    count += 1;
                }
                ReadLine::TimedOut => return Err(ProtocolError::TimedOut(command.text())),
            }
        }
    }

    /// Send a command followed by the sentinel and collect its output lines
    pub fn query_block(&mut self, command: &Command) -> Result<Vec<String>, ProtocolError> {
        let mut lines = Vec::new();
        self.for_each_block_line(command, |line| {
            lines.push(line);
            Ok(())
        })?;
        Ok(lines)
    }

    /// Raw `fs list` output, one `<start> <end>` line per stored log
    pub fn list_logs(&mut self) -> Result<Vec<String>, ProtocolError> {
        self.reset()?;
        let lines = self.query_block(&Command::FsList)?;
        debug!("fs list returned {} logs", lines.len());
        Ok(lines)
    }

    /// Download one log to `dest`, writing each line as it arrives
    ///
    /// The file is only created once the first log line is received. An
    /// interrupted download leaves the lines received so far on disk.
    pub fn download_log(&mut self, name: &str, dest: &Path) -> Result<DownloadOutcome, ProtocolError> {
        self.reset()?;

        let command = Command::FsRead(name.to_string());
        let started = Instant::now();
        self.write_command(&command.wire_with_sentinel())?;

        let mut writer: Option<LineWriter<File>> = None;
        let mut records = 0usize;

        loop {
            match self.reader.read_line()? {
                ReadLine::Line(line) if is_sentinel(&line) => break,
                ReadLine::Line(line) if line.is_empty() => continue,
                ReadLine::Line(line) => {
                    if writer.is_none() {
                        writer = Some(LineWriter::new(File::create(dest)?));
                    }
                    if let Some(w) = writer.as_mut() {
                        writeln!(w, "{}", line)?;
                    }
                    records += 1;
                }
                ReadLine::TimedOut if records == 0 => {
                    warn!("LOG-{} zero length", name);
                    return Ok(DownloadOutcome::Empty);
                }
                ReadLine::TimedOut => {
                    warn!("LOG-{} download timed out after {} records", name, records);
                    return Err(ProtocolError::TimedOut(command.text()));
                }
            }
        }

        match writer {
            Some(mut w) => {
                w.flush()?;
                let elapsed = started.elapsed();
                info!(
                    "LOG download-{} ({} records in {:.3}s)",
                    dest.display(),
                    records,
                    elapsed.as_secs_f64()
                );
                Ok(DownloadOutcome::Downloaded {
                    path: dest.to_path_buf(),
                    records,
                    elapsed,
                })
            }
            None => {
                warn!("LOG-{} zero length", name);
                Ok(DownloadOutcome::Empty)
            }
        }
    }

    /// Delete one log from the device
    ///
    /// `fs del` produces no response, so the trailing sentinel is read with
    /// the extended delete timeout.
    pub fn delete_log(&mut self, name: &str) -> Result<(), ProtocolError> {
        info!("Deleting log {}", name);
        self.reset()?;

        let started = Instant::now();
        self.write_command(&Command::FsDel(name.to_string()).wire())?;

        let original = self.reader.get_ref().timeout();
        self.reader.get_mut().set_timeout(self.config.delete_timeout)?;
        let result = self.send_and_expect(&Command::MdMach, RESP_OK);
        self.reader.get_mut().set_timeout(original)?;

        let res = result?;
        info!(
            "fs delete result={} in {:.2} seconds",
            res,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Query the device configuration
    pub fn device_config(&mut self) -> Result<DeviceConfigReport, ProtocolError> {
        self.reset()?;

        let mut report = DeviceConfigReport::default();

        for cfg in CONFIG_COMMANDS {
            report.lines.push(String::new());
            report.lines.push(format!("CONFIG-{}", cfg.description));

            let mut setting = ConfigSetting {
                description: cfg.description.to_string(),
                ..ConfigSetting::default()
            };

            match cfg.kind {
                ConfigKind::Single => {
                    let value = self.query(&Command::Raw(cfg.command.to_string()))?;
                    report.lines.push(format!("  {}", value));
                    setting.value = Some(value);
                }
                ConfigKind::SubCommands(subs) => {
                    for (sub, description) in subs {
                        let command = Command::Raw(format!("{} {}", cfg.command, sub));
                        let value = self.query(&command)?;
                        report.lines.push(format!(
                            "  {}",
                            format_sub_setting(sub, &value, *description)
                        ));
                        setting.subcommands.push(SubSetting {
                            name: sub.to_string(),
                            value,
                            description: description.map(str::to_string),
                        });
                    }
                }
                ConfigKind::MultiLine => {
                    let lines = self.query_block(&Command::Raw(cfg.command.to_string()))?;
                    report.lines.extend(lines.iter().map(|l| format!("  {}", l)));
                    setting.multivalue = lines;
                }
            }

            report.settings.push((cfg.command.to_string(), setting));
        }

        Ok(report)
    }

    fn read_serial_number(&mut self) -> Result<String, ProtocolError> {
        self.write_command(&Command::SerialNumber.wire())?;
        match self.reader.read_line()? {
            ReadLine::Line(sn) if !sn.is_empty() => Ok(sn),
            _ => Err(ProtocolError::DeviceNotResponding(
                "cmd sn: returned empty".to_string(),
            )),
        }
    }

    /// Read and discard output left over from an earlier session
    ///
    /// Each read asks for one byte more than is waiting; a short read means
    /// the device has gone quiet.
    fn flush_stale(&mut self) -> Result<usize, ProtocolError> {
        let mut flushed = self.reader.discard_buffered();
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let channel = self.reader.get_mut();

        loop {
            let want = (channel.bytes_to_read()? as usize + 1).min(READ_CHUNK_SIZE);
            let n = match channel.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if is_timeout(&e) => 0,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            flushed += n;
            if n < want {
                break;
            }
        }

        if flushed > 0 {
            debug!("Flushed {} stale bytes from the device", flushed);
        }
        Ok(flushed)
    }

    fn write_command(&mut self, wire: &str) -> Result<(), ProtocolError> {
        debug!("-> {:?}", wire);
        let channel = self.reader.get_mut();
        channel.write_all(wire.as_bytes())?;
        channel.flush()?;
        Ok(())
    }
}

/// Format `sub=value`, with any description starting at the report column
fn format_sub_setting(sub: &str, value: &str, description: Option<&str>) -> String {
    let entry = format!("{}={}", sub, value);
    match description {
        Some(desc) => {
            let width = REPORT_DESCRIPTION_COLUMN.max(entry.len() + 2);
            format!("{:<width$}{}", entry, desc, width = width)
        }
        None => entry,
    }
}
