//! Log record tokenizing
//!
//! Every log line is a space separated list of `KEY=VALUE` pairs. The first
//! line is the START record, the last the END record; both carry `DATE` and
//! `TIME`. Lines between are DATA records sampled every two seconds.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use super::geo::parse_ddmm;

/// Fields every START record carries
pub const START_FIELDS: &[&str] = &["FWVER", "SN", "DATE", "TIME"];

/// Fields every DATA record carries
pub const DATA_FIELDS: &[&str] = &[
    "ALT", "ROC", "AMBT", "GPSS", "SOG", "COG", "LONG", "LAT", "TOPTS", "TOPT", "BATM", "BRDT",
];

/// Fields every END record carries
pub const END_FIELDS: &[&str] = &["DATE", "TIME"];

/// `GPSS` value when the GPS has a fix
pub const GPS_FIX: &str = "0";

/// `TOPTS` value when the top temperature sensor reading is valid
pub const TOP_TEMP_VALID: &str = "1";

/// Format of the joined `DATE` and `TIME` fields
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Why a single record could not be used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("token '{0}' is not KEY=VALUE")]
    BadToken(String),

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("field {field} has invalid value '{value}'")]
    BadValue { field: &'static str, value: String },

    #[error("line is not valid UTF-8")]
    InvalidEncoding,
}

/// One tokenized log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    fields: HashMap<&'a str, &'a str>,
}

impl<'a> Record<'a> {
    /// Split a line into its `KEY=VALUE` fields
    pub fn parse(line: &'a str) -> Result<Self, RecordError> {
        let fields = line
            .split_whitespace()
            .map(|token| {
                token
                    .split_once('=')
                    .ok_or_else(|| RecordError::BadToken(token.to_string()))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { fields })
    }

    /// Value of a field
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.fields.get(key).copied()
    }

    /// First required field the record lacks
    pub fn missing_field(&self, required: &[&'static str]) -> Option<&'static str> {
        required
            .iter()
            .copied()
            .find(|key| !self.fields.contains_key(key))
    }

    /// Whether the record carries a `DATE`, marking a START or END record
    pub fn has_date(&self) -> bool {
        self.fields.contains_key("DATE")
    }

    /// The `DATE`/`TIME` timestamp of a START or END record
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let text = format!("{} {}", self.get("DATE")?, self.get("TIME")?);
        NaiveDateTime::parse_from_str(&text, RECORD_TIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// A required numeric field
    pub fn number(&self, key: &'static str) -> Result<f64, RecordError> {
        let value = self.get(key).ok_or(RecordError::MissingField(key))?;
        value.parse().map_err(|_| RecordError::BadValue {
            field: key,
            value: value.to_string(),
        })
    }

    /// An optional numeric field
    pub fn optional_number(&self, key: &'static str) -> Result<Option<f64>, RecordError> {
        match self.get(key) {
            Some(_) => self.number(key).map(Some),
            None => Ok(None),
        }
    }

    /// A latitude or longitude field in degrees
    pub fn coordinate(&self, key: &'static str) -> Result<f64, RecordError> {
        let value = self.get(key).ok_or(RecordError::MissingField(key))?;
        parse_ddmm(value).ok_or_else(|| RecordError::BadValue {
            field: key,
            value: value.to_string(),
        })
    }
}

/// Values of a DATA record, in device units
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    /// Pressure altitude, metres
    pub altitude: f64,
    /// Rate of climb, m/s
    pub climb_rate: f64,
    /// Ambient temperature, °C
    pub ambient_temp: f64,
    /// GPS fix acquired
    pub gps_fix: bool,
    /// Reported speed over ground, m/s
    pub speed: f64,
    /// Course over ground, degrees
    pub course: f64,
    /// Degrees, negative west
    pub longitude: f64,
    /// Degrees, negative south
    pub latitude: f64,
    /// Top temperature, °C, when the sensor reading is valid
    pub top_temp: Option<f64>,
    /// Battery voltage
    pub battery: f64,
    /// Board temperature, °C
    pub board_temp: f64,
    /// Barometric pressure, hPa (not logged by all firmware)
    pub pressure: Option<f64>,
    /// GPS altitude above mean sea level, metres (firmware 1.3 and later)
    pub gps_altitude: Option<f64>,
}

impl DataRecord {
    /// Decode a DATA record
    pub fn from_record(record: &Record<'_>) -> Result<Self, RecordError> {
        if let Some(missing) = record.missing_field(DATA_FIELDS) {
            return Err(RecordError::MissingField(missing));
        }

        let top_temp = if record.get("TOPTS") == Some(TOP_TEMP_VALID) {
            Some(record.number("TOPT")?)
        } else {
            None
        };

        Ok(Self {
            altitude: record.number("ALT")?,
            climb_rate: record.number("ROC")?,
            ambient_temp: record.number("AMBT")?,
            gps_fix: record.get("GPSS") == Some(GPS_FIX),
            speed: record.number("SOG")?,
            course: record.number("COG")?,
            longitude: record.coordinate("LONG")?,
            latitude: record.coordinate("LAT")?,
            top_temp,
            battery: record.number("BATM")?,
            board_temp: record.number("BRDT")?,
            pressure: record.optional_number("BAR")?,
            gps_altitude: record.optional_number("MSLALT")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DATA_LINE: &str = "ALT=1523.4 ROC=1.2 AMBT=18.5 GPSS=0 SOG=12.5 COG=270.0 \
        LONG=12204.5000W LAT=3730.0000N TOPTS=1 TOPT=35.5 BATM=3.92 BRDT=24.0 BAR=845.21";

    #[test]
    fn test_parse_fields() {
        let record = Record::parse("FWVER=1.3 SN=SN11005 DATE=2020-06-14 TIME=17:03:42").unwrap();
        assert_eq!(record.get("FWVER"), Some("1.3"));
        assert_eq!(record.missing_field(START_FIELDS), None);
        assert!(record.has_date());
        assert_eq!(
            record.timestamp(),
            Some(Utc.with_ymd_and_hms(2020, 6, 14, 17, 3, 42).unwrap())
        );
    }

    #[test]
    fn test_bad_token() {
        assert_eq!(
            Record::parse("ALT=1 garbage"),
            Err(RecordError::BadToken("garbage".into()))
        );
    }

    #[test]
    fn test_first_missing_field() {
        let record = Record::parse("ALT=1 ROC=0").unwrap();
        assert_eq!(record.missing_field(DATA_FIELDS), Some("AMBT"));
    }

    #[test]
    fn test_data_record() {
        let data = DataRecord::from_record(&Record::parse(DATA_LINE).unwrap()).unwrap();
        assert!(data.gps_fix);
        assert_eq!(data.altitude, 1523.4);
        assert_eq!(data.latitude, 37.5);
        assert!((data.longitude - -122.075).abs() < 1e-9);
        assert_eq!(data.top_temp, Some(35.5));
        assert_eq!(data.pressure, Some(845.21));
        assert_eq!(data.gps_altitude, None);
    }

    #[test]
    fn test_invalid_top_temp_ignored() {
        let line = DATA_LINE.replace("TOPTS=1 TOPT=35.5", "TOPTS=0 TOPT=---");
        let data = DataRecord::from_record(&Record::parse(&line).unwrap()).unwrap();
        assert_eq!(data.top_temp, None);
    }

    #[test]
    fn test_bad_number() {
        let line = DATA_LINE.replace("ALT=1523.4", "ALT=high");
        assert!(matches!(
            DataRecord::from_record(&Record::parse(&line).unwrap()),
            Err(RecordError::BadValue { field: "ALT", .. })
        ));
    }
}
