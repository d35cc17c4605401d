//! Configuration
//!
//! [`AppConfig`] holds the application settings that the core needs and is
//! passed explicitly to each component. [`ConversionOptions`] are the
//! per-log parser settings: application defaults overridden by the log's
//! sidecar metadata file.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::protocol::DEFAULT_TIMEOUT_MS;
use crate::unit_conversion::UnitSystem;

/// Hidden settings file in the user's home directory
pub const CONFIG_FILE_NAME: &str = ".DBI3config";

/// Format of trim timestamps in sidecar metadata
pub const TRIM_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {field} '{value}', expected YYYYMMDDhhmmss")]
    InvalidTrimTime { field: &'static str, value: String },
}

/// Application settings used by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of downloaded logs; each device gets a subdirectory
    pub log_path: PathBuf,

    /// Serial port; discovered by USB VID:PID when unset
    pub com_port: Option<String>,

    /// Per-read serial timeout in milliseconds
    pub timeout_ms: u64,

    /// Metric output units when true, imperial otherwise
    pub use_metric: bool,

    /// Prefer GPS altitude over pressure altitude when the log has both
    pub prefer_gps: bool,

    /// Drop catalog entries too short to contain any data
    pub skip_invalid: bool,

    /// Catalog only logs newer than the latest downloaded one
    pub new_logs_only: bool,

    /// Catalog only logs younger than this many days
    pub age_limit_days: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            com_port: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            use_metric: false,
            prefer_gps: true,
            skip_invalid: false,
            new_logs_only: true,
            age_limit_days: None,
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Output unit system
    pub fn units(&self) -> UnitSystem {
        UnitSystem::from_metric(self.use_metric)
    }
}

/// Default log root, `~/Documents/DBI3logs`
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("Documents")
        .join("DBI3logs")
}

/// Default settings file, `~/.DBI3config`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(CONFIG_FILE_NAME)
}

/// Sidecar metadata path for a log file: the log's basename, hidden, without extension
pub fn sidecar_path_for(log_file: &Path) -> PathBuf {
    let stem = log_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    log_file.with_file_name(format!(".{}", stem))
}

/// Read and parse a sidecar metadata file, `None` if it does not exist
pub fn load_sidecar(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Settings for parsing one log
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversionOptions {
    /// Output unit system
    pub units: UnitSystem,
    /// Use GPS altitude for track coordinates when present
    pub prefer_gps: bool,
    /// Added to every pressure altitude, metres
    pub altitude_offset: Option<f64>,
    /// Records before this time are trimmed
    pub trim_start_time: Option<DateTime<Utc>>,
    /// Records after this time are trimmed
    pub trim_end_time: Option<DateTime<Utc>>,
    /// Free text shown with the track
    pub track_note: Option<String>,
    /// The raw sidecar metadata, passed through to the renderer
    pub metadata: Option<Value>,
}

impl ConversionOptions {
    /// Defaults taken from the application settings
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            units: config.units(),
            prefer_gps: config.prefer_gps,
            ..Self::default()
        }
    }

    /// Options for one log file, applying its sidecar metadata if present
    pub fn for_log(
        log_file: &Path,
        config: &AppConfig,
        altitude_offset: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let mut options = Self::from_app_config(config);
        options.altitude_offset = altitude_offset;

        if let Some(metadata) = load_sidecar(&sidecar_path_for(log_file))? {
            options.apply_metadata(&metadata)?;
        }
        Ok(options)
    }

    /// Override settings from sidecar metadata. Unknown keys are ignored.
    pub fn apply_metadata(&mut self, metadata: &Value) -> Result<(), ConfigError> {
        if let Some(offset) = metadata.get("altitude_offset").and_then(Value::as_f64) {
            self.altitude_offset = Some(offset);
        }
        if let Some(metric) = metadata.get("kml_use_metric").and_then(Value::as_bool) {
            self.units = UnitSystem::from_metric(metric);
        }
        if let Some(prefer) = metadata.get("prefer_gps").and_then(Value::as_bool) {
            self.prefer_gps = prefer;
        }
        if let Some(note) = metadata.get("track_note").and_then(Value::as_str) {
            self.track_note = Some(note.to_string());
        }
        if let Some(start) = metadata.get("trim_start_time").and_then(Value::as_str) {
            self.trim_start_time = Some(parse_trim_time("trim_start_time", start)?);
        }
        if let Some(end) = metadata.get("trim_end_time").and_then(Value::as_str) {
            self.trim_end_time = Some(parse_trim_time("trim_end_time", end)?);
        }

        self.metadata = Some(metadata.clone());
        Ok(())
    }
}

fn parse_trim_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, ConfigError> {
    NaiveDateTime::parse_from_str(value, TRIM_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ConfigError::InvalidTrimTime {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_sidecar_path() {
        let path = Path::new("/logs/SN11005/2020_06_14_17_03_42.log");
        assert_eq!(
            sidecar_path_for(path),
            PathBuf::from("/logs/SN11005/.2020_06_14_17_03_42")
        );
    }

    #[test]
    fn test_missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = AppConfig {
            com_port: Some("/dev/ttyUSB3".into()),
            use_metric: true,
            age_limit_days: Some(30),
            ..AppConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"use_metric": true}"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert!(config.use_metric);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_metadata_overrides() {
        let mut options = ConversionOptions::from_app_config(&AppConfig::default());
        options
            .apply_metadata(&json!({
                "altitude_offset": -12.5,
                "kml_use_metric": true,
                "trim_start_time": "20200614170400",
                "track_note": "Cross country",
                "extend_to_ground": true
            }))
            .unwrap();

        assert_eq!(options.altitude_offset, Some(-12.5));
        assert_eq!(options.units, UnitSystem::Metric);
        assert_eq!(
            options.trim_start_time,
            Some(Utc.with_ymd_and_hms(2020, 6, 14, 17, 4, 0).unwrap())
        );
        assert_eq!(options.trim_end_time, None);
        assert_eq!(options.track_note.as_deref(), Some("Cross country"));
        assert!(options.metadata.is_some());
    }

    #[test]
    fn test_bad_trim_time() {
        let mut options = ConversionOptions::default();
        let result = options.apply_metadata(&json!({"trim_end_time": "yesterday"}));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidTrimTime {
                field: "trim_end_time",
                ..
            })
        ));
    }

    #[test]
    fn test_for_log_reads_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("2020_06_14_17_03_42.log");
        fs::write(&log, "").unwrap();
        fs::write(dir.path().join(".2020_06_14_17_03_42"), r#"{"altitude_offset": 3.0}"#)
            .unwrap();

        let options = ConversionOptions::for_log(&log, &AppConfig::default(), Some(1.0)).unwrap();
        assert_eq!(options.altitude_offset, Some(3.0));
        assert!(options.prefer_gps);
    }
}
