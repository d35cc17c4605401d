//! Log Catalog
//!
//! Reconciles the device's log index with the logs already downloaded to
//! `<log_root>/<serial>/`, and downloads the ones that are new.

mod store;

pub use store::{parse_log_filename, LocalLogStore, StoredLog};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::protocol::{CommunicationChannel, DownloadOutcome, ProtocolError, Session};
use crate::rad26::{decode, DeviceTimestamp, Rad26Error, TIMESTAMP_RESOLUTION};

/// Logs shorter than this cannot hold a GPS fix
pub const MIN_VALID_DURATION: TimeDelta = TimeDelta::seconds(3);

/// Catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which device logs to catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CatalogFilter {
    /// Every log on the device
    #[default]
    All,
    /// Logs that start after the newest downloaded log
    NewerThanLocal,
    /// Logs that start within this many days
    AgeLimitDays(u32),
}

impl CatalogFilter {
    /// Filter selected by the application settings
    pub fn from_config(config: &AppConfig) -> Self {
        match (config.new_logs_only, config.age_limit_days) {
            (true, _) => CatalogFilter::NewerThanLocal,
            (false, Some(days)) => CatalogFilter::AgeLimitDays(days),
            (false, None) => CatalogFilter::All,
        }
    }
}

/// A device log, named by its start and end time in RAD26
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LogIdentifier {
    /// RAD26 start identifier
    pub name_start: String,
    /// RAD26 end identifier
    pub name_end: String,
}

impl FromStr for LogIdentifier {
    type Err = Rad26Error;

    /// Parse one `fs list` line, `<start> <end>`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => Ok(Self {
                name_start: start.to_string(),
                name_end: end.to_string(),
            }),
            _ => Err(Rad26Error::BadPair(line.to_string())),
        }
    }
}

/// One device log and its local state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogCatalogEntry {
    /// Identifier as listed by the device
    pub identifier: LogIdentifier,
    /// Decoded start time
    pub start: DeviceTimestamp,
    /// Decoded end time
    pub end: DeviceTimestamp,
    /// Local filename, `YYYY_MM_DD_HH_MM_SS.log`
    pub filename: String,
    /// Hidden sidecar filename, `.YYYY_MM_DD_HH_MM_SS`
    pub meta_name: String,
    /// Not yet downloaded
    pub is_new: bool,
    /// Sidecar metadata, passed through to conversion
    pub metadata_override: Option<Value>,
}

impl LogCatalogEntry {
    /// Time between the start and end identifiers
    pub fn duration(&self) -> TimeDelta {
        self.end.datetime() - self.start.datetime()
    }
}

/// How one log of a batch download ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DownloadStatus {
    /// Written to disk
    Downloaded {
        /// Lines written
        records: usize,
        /// Time taken
        elapsed: Duration,
    },
    /// The device returned nothing; no file was written
    Empty,
    /// The device or the filesystem failed
    Failed(String),
    /// Skipped after an earlier failure ended the batch
    NotAttempted,
}

/// Per-log result of [`LogCatalog::download_new`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadReport {
    /// RAD26 start identifier
    pub name: String,
    /// Local filename
    pub filename: String,
    /// How the download ended
    pub status: DownloadStatus,
}

impl DownloadReport {
    /// Whether a file was written
    pub fn is_success(&self) -> bool {
        matches!(self.status, DownloadStatus::Downloaded { .. })
    }
}

/// Catalog of one device's logs against its local store
#[derive(Debug, Clone)]
pub struct LogCatalog {
    store: LocalLogStore,
    skip_invalid: bool,
}

impl LogCatalog {
    /// Catalog over an existing store
    pub fn new(store: LocalLogStore, config: &AppConfig) -> Self {
        Self {
            store,
            skip_invalid: config.skip_invalid,
        }
    }

    /// Catalog for a device under the configured log root
    pub fn for_device(config: &AppConfig, serial_number: &str) -> Self {
        Self::new(LocalLogStore::new(&config.log_path, serial_number), config)
    }

    /// The local log store
    pub fn store(&self) -> &LocalLogStore {
        &self.store
    }

    /// Earliest start time a log may have to pass `filter`
    pub fn threshold(
        &self,
        filter: CatalogFilter,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CatalogError> {
        let threshold = match filter {
            CatalogFilter::All => None,
            CatalogFilter::NewerThanLocal => self
                .store
                .latest_log_time()?
                .map(|latest| latest + TIMESTAMP_RESOLUTION),
            CatalogFilter::AgeLimitDays(days) => Some(now - TimeDelta::days(i64::from(days))),
        };
        debug!("Catalog threshold {:?} for {:?}", threshold, filter);
        Ok(threshold)
    }

    /// Build catalog entries from `fs list` output, sorted by identifier
    ///
    /// Lines with malformed identifiers are logged and skipped.
    pub fn build<S: AsRef<str>>(
        &self,
        lines: &[S],
        filter: CatalogFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<LogCatalogEntry>, CatalogError> {
        let threshold = self.threshold(filter, now)?;

        let mut entries = Vec::new();
        for line in lines {
            let line = line.as_ref();
            match self.entry(line, threshold) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!("Skipping catalog line: {}", e),
            }
        }

        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        info!(
            "DBI3 log list length {} ({} new)",
            entries.len(),
            entries.iter().filter(|e| e.is_new).count()
        );
        Ok(entries)
    }

    /// Query the device and build its catalog
    pub fn list_logs<C: CommunicationChannel>(
        &self,
        session: &mut Session<C>,
        filter: CatalogFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<LogCatalogEntry>, CatalogError> {
        let lines = session.list_logs()?;
        self.build(&lines, filter, now)
    }

    /// Download every new entry
    ///
    /// A protocol failure ends the batch; logs after it are reported as not
    /// attempted. Files already written are left in place.
    pub fn download_new<C: CommunicationChannel>(
        &self,
        session: &mut Session<C>,
        entries: &[LogCatalogEntry],
    ) -> Result<Vec<DownloadReport>, CatalogError> {
        let pending: Vec<&LogCatalogEntry> = entries.iter().filter(|e| e.is_new).collect();
        if pending.is_empty() {
            info!("No new logs to download");
            return Ok(Vec::new());
        }
        self.store.ensure_dir()?;

        let mut reports = Vec::with_capacity(pending.len());
        let mut aborted = false;

        for entry in pending {
            let status = if aborted {
                DownloadStatus::NotAttempted
            } else {
                let dest = self.store.log_path(&entry.filename);
                match session.download_log(&entry.identifier.name_start, &dest) {
                    Ok(DownloadOutcome::Downloaded {
                        records, elapsed, ..
                    }) => DownloadStatus::Downloaded { records, elapsed },
                    Ok(DownloadOutcome::Empty) => DownloadStatus::Empty,
                    Err(e) => {
                        warn!("Download of {} failed: {}", entry.filename, e);
                        aborted = true;
                        DownloadStatus::Failed(e.to_string())
                    }
                }
            };

            reports.push(DownloadReport {
                name: entry.identifier.name_start.clone(),
                filename: entry.filename.clone(),
                status,
            });
        }

        Ok(reports)
    }

    fn entry(
        &self,
        line: &str,
        threshold: Option<DateTime<Utc>>,
    ) -> Result<Option<LogCatalogEntry>, Rad26Error> {
        let identifier: LogIdentifier = line.parse()?;

        let start = decode(&identifier.name_start)?;
        if threshold.is_some_and(|t| start.datetime() < t) {
            return Ok(None);
        }
        let end = decode(&identifier.name_end)?;

        let basename = start.log_basename();
        let filename = start.log_filename();

        if self.skip_invalid && end.datetime() - start.datetime() < MIN_VALID_DURATION {
            debug!("Ignoring log {} ({}): short duration", identifier.name_start, basename);
            return Ok(None);
        }

        Ok(Some(LogCatalogEntry {
            is_new: !self.store.contains(&filename),
            metadata_override: self.store.load_sidecar(&filename),
            meta_name: format!(".{}", basename),
            identifier,
            start,
            end,
            filename,
        }))
    }
}
