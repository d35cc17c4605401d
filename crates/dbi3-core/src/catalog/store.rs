//! Downloaded logs of one device on the local filesystem

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::CatalogError;
use crate::config::{load_sidecar, sidecar_path_for};
use crate::rad26::LOG_BASENAME_FORMAT;

fn log_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4}_\d{2}_\d{2}_\d{2}_\d{2}_\d{2})\.log$").expect("log name pattern")
    })
}

/// Start time encoded in a log filename, `None` for any other file
pub fn parse_log_filename(name: &str) -> Option<DateTime<Utc>> {
    let basename = log_name_pattern().captures(name)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(basename, LOG_BASENAME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A log already downloaded
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLog {
    /// Path of the log file
    pub path: PathBuf,
    /// Start time from the filename
    pub start: DateTime<Utc>,
    /// Path of its metadata sidecar, which may not exist
    pub sidecar_path: PathBuf,
    /// Parsed sidecar metadata
    pub metadata: Option<Value>,
}

/// The per-device log directory, `<log_root>/<serial>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLogStore {
    dir: PathBuf,
}

impl LocalLogStore {
    /// Store for one device under `log_root`
    pub fn new(log_root: &Path, serial_number: &str) -> Self {
        Self {
            dir: log_root.join(serial_number),
        }
    }

    /// The per-device directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed
    pub fn ensure_dir(&self) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.dir).map_err(|source| CatalogError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// Path of a log in this store
    pub fn log_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Path of the sidecar for a log in this store
    pub fn sidecar_path(&self, filename: &str) -> PathBuf {
        sidecar_path_for(&self.log_path(filename))
    }

    /// Whether a log of this name has been downloaded
    pub fn contains(&self, filename: &str) -> bool {
        self.log_path(filename).is_file()
    }

    /// Sidecar metadata of a log. An unreadable sidecar is logged and ignored.
    pub fn load_sidecar(&self, filename: &str) -> Option<Value> {
        let path = self.sidecar_path(filename);
        match load_sidecar(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Ignoring metadata for {}: {}", filename, e);
                None
            }
        }
    }

    /// Start time of the newest downloaded log
    ///
    /// Files are scanned in descending name order; names that are not log
    /// names are skipped.
    pub fn latest_log_time(&self) -> Result<Option<DateTime<Utc>>, CatalogError> {
        let mut names = self.file_names()?;
        names.sort_unstable_by(|a, b| b.cmp(a));
        let latest = names.iter().find_map(|name| parse_log_filename(name));
        debug!("Latest local log in {}: {:?}", self.dir.display(), latest);
        Ok(latest)
    }

    /// Downloaded logs in ascending time order
    pub fn list(&self) -> Result<Vec<StoredLog>, CatalogError> {
        let mut logs: Vec<StoredLog> = self
            .file_names()?
            .into_iter()
            .filter_map(|name| {
                let start = parse_log_filename(&name)?;
                Some(StoredLog {
                    path: self.log_path(&name),
                    start,
                    sidecar_path: self.sidecar_path(&name),
                    metadata: self.load_sidecar(&name),
                })
            })
            .collect();
        logs.sort_by_key(|log| log.start);
        Ok(logs)
    }

    /// Names of regular files in the directory; empty if it does not exist
    fn file_names(&self) -> Result<Vec<String>, CatalogError> {
        let io_err = |source: io::Error| CatalogError::Io {
            path: self.dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}
