//! Protocol commands
//!
//! Defines the commands of the DBI3 serial command line.

use std::fmt;

/// Response accepted from `md mach`
pub const RESP_OK: &[&str] = &["ok"];

/// Response accepted from commands that may legitimately refuse, e.g. `fs stop`
pub const RESP_ANY: &[&str] = &["ok", "nok"];

/// Terminator appended to every command
pub const COMMAND_TERMINATOR: char = '\r';

/// DBI3 commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read the device serial number (`sn`)
    SerialNumber,

    /// Stop any current logging activity (`fs stop`), returns ok or nok
    FsStop,

    /// No-op used as the end-of-block sentinel (`md mach`), returns ok
    MdMach,

    /// List stored logs (`fs list`), one `<start> <end>` line per log
    FsList,

    /// Stream a stored log (`fs read <start>`)
    FsRead(String),

    /// Delete a stored log (`fs del <start>`), no response at all
    FsDel(String),

    /// Any other command line, e.g. configuration queries
    Raw(String),
}

impl Command {
    /// Command text without terminator
    pub fn text(&self) -> String {
        match self {
            Command::SerialNumber => "sn".to_string(),
            Command::FsStop => "fs stop".to_string(),
            Command::MdMach => "md mach".to_string(),
            Command::FsList => "fs list".to_string(),
            Command::FsRead(name) => format!("fs read {}", name),
            Command::FsDel(name) => format!("fs del {}", name),
            Command::Raw(text) => text.clone(),
        }
    }

    /// Bytes sent on the wire
    pub fn wire(&self) -> String {
        format!("{}{}", self.text(), COMMAND_TERMINATOR)
    }

    /// Bytes sent on the wire, followed by the `md mach` sentinel
    pub fn wire_with_sentinel(&self) -> String {
        format!("{}{}", self.wire(), Command::MdMach.wire())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Whether a line is the `md mach` sentinel response
pub fn is_sentinel(line: &str) -> bool {
    RESP_ANY.contains(&line)
}

/// How a configuration query answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// A single line holding the value
    Single,
    /// One single-line query per sub-command, with an optional description
    SubCommands(&'static [(&'static str, Option<&'static str>)]),
    /// Several lines, ended with the sentinel
    MultiLine,
}

/// A device configuration query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCommand {
    /// Base command
    pub command: &'static str,
    /// Report heading
    pub description: &'static str,
    /// Response shape
    pub kind: ConfigKind,
}

/// Queries that together report the device's current configuration
pub const CONFIG_COMMANDS: &[ConfigCommand] = &[
    ConfigCommand {
        command: "gu",
        description: "Get Units Settings",
        kind: ConfigKind::SubCommands(&[
            ("alt", None),
            ("roc", None),
            ("bar", None),
            ("temp", None),
            ("sog", None),
        ]),
    },
    ConfigCommand {
        command: "ga",
        description: "Get Alarm Settings",
        kind: ConfigKind::SubCommands(&[
            ("alth", None),
            ("altl", None),
            ("clmb", None),
            ("desc", None),
            ("topt", None),
        ]),
    },
    ConfigCommand {
        command: "gf",
        description: "Get Function Settings",
        kind: ConfigKind::SubCommands(&[
            ("aut", Some("Altimeter Unit Toggle Mode")),
            ("frs", Some("Flight Recorder Start Mode")),
            ("aof", Some("Instrument Auto Turn Off Mode")),
            ("dat", None),
        ]),
    },
    ConfigCommand {
        command: "gv",
        description: "Get Variometer Settings",
        kind: ConfigKind::SubCommands(&[
            ("resp", Some("Response Time Seconds")),
            ("audio", Some("Variometer Audio Mode")),
            ("clmbt", Some("Climb Audio Threshold")),
            ("desct", Some("Descent Audio Threshold")),
        ]),
    },
    ConfigCommand {
        command: "gt",
        description: "Get Temp Sensor Unit Codes",
        kind: ConfigKind::SubCommands(&[
            ("top 1", None),
            ("top 2", None),
            ("top 3", None),
            ("top 4", None),
            ("amb 1", None),
            ("amb 2", None),
        ]),
    },
    ConfigCommand {
        command: "gi",
        description: "Get Nonvolatile Info",
        kind: ConfigKind::SubCommands(&[("mod", None), ("brd", None), ("date", None)]),
    },
    ConfigCommand {
        command: "sn",
        description: "DBI3 Serial Number",
        kind: ConfigKind::Single,
    },
    ConfigCommand {
        command: "vr",
        description: "Firmware Version",
        kind: ConfigKind::Single,
    },
    ConfigCommand {
        command: "cc",
        description: "Battery Fuel Gauge",
        kind: ConfigKind::Single,
    },
    ConfigCommand {
        command: "rd all",
        description: "DBI3 Current Flight Data",
        kind: ConfigKind::MultiLine,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(Command::FsStop.wire(), "fs stop\r");
        assert_eq!(
            Command::FsRead("BCDEFGH".into()).wire_with_sentinel(),
            "fs read BCDEFGH\rmd mach\r"
        );
    }

    #[test]
    fn test_is_sentinel() {
        assert!(is_sentinel("ok"));
        assert!(is_sentinel("nok"));
        assert!(!is_sentinel("AAAAAAB AAAAAAC"));
    }
}
