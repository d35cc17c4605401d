//! Flight Log Parsing
//!
//! Turns a downloaded DBI3 log into a unit-converted time series plus the
//! "trip computer" statistics shown with a rendered track.
//!
//! A log is one START record, any number of DATA records and at most one END
//! record. Problems with individual DATA lines are counted and skipped; only
//! an unusable START record fails the whole parse.

mod geo;
mod parser;
mod record;
mod summary;

pub use geo::{haversine_distance, parse_ddmm, BoundingBox, EARTH_RADIUS_KM};
pub use parser::FlightLog;
pub use record::{
    DataRecord, Record, RecordError, DATA_FIELDS, END_FIELDS, GPS_FIX, RECORD_TIME_FORMAT,
    START_FIELDS, TOP_TEMP_VALID,
};
pub use summary::{ElapsedTime, TrackSummary};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::unit_conversion::UnitSystem;

/// Time between DATA records
pub const SAMPLE_INTERVAL: TimeDelta = TimeDelta::seconds(2);

/// Top temperature shown when the sensor reading is invalid, °C
pub const MISSING_TOP_TEMP_C: f64 = 40.0;

/// Top temperature shown when the sensor reading is invalid, °F
pub const MISSING_TOP_TEMP_F: f64 = 100.0;

/// Errors that make a whole log unusable
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed START record: {0}")]
    MalformedStartRecord(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What happened to one DATA line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// GPS fix inside the trim window, appended to the track
    Accepted,
    /// No GPS fix
    NoFix,
    /// Outside the trim window
    Trimmed,
    /// Unusable line
    Bad(RecordError),
}

/// Line counts by category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    /// Every non-blank line read, including START and END
    pub total: usize,
    /// Accepted GPS data records
    pub data: usize,
    /// Records outside the trim window
    pub trimmed: usize,
    /// Malformed records
    pub bad: usize,
    /// Records without a GPS fix
    pub no_fix: usize,
}

impl RecordCounts {
    pub(crate) fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Accepted => self.data += 1,
            RecordOutcome::NoFix => self.no_fix += 1,
            RecordOutcome::Trimmed => self.trimmed += 1,
            RecordOutcome::Bad(_) => self.bad += 1,
        }
    }
}

/// One accepted sample, already in output units
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    /// Nominal sample time
    pub time: DateTime<Utc>,
    /// Decimal degrees, north positive
    pub latitude: f64,
    /// Decimal degrees, east positive
    pub longitude: f64,
    /// Pressure altitude plus any offset
    pub altitude: f64,
    /// Altitude used for the track coordinate, metres
    pub coord_altitude: f64,
    /// GPS altitude, when the firmware reports it
    pub gps_altitude: Option<f64>,
    /// Barometric pressure, when the firmware reports it
    pub pressure: Option<f64>,
    /// Course over ground, degrees
    pub course: f64,
    /// Reported speed over ground
    pub speed: f64,
    /// Speed from the distance to the previous sample
    pub computed_speed: Option<f64>,
    /// Rate of climb
    pub climb_rate: f64,
    /// Ambient temperature
    pub ambient_temp: f64,
    /// Top temperature, or the default when no probe reports
    pub top_temp: f64,
    /// Top minus ambient temperature
    pub temp_diff: f64,
    /// Battery voltage
    pub battery: f64,
    /// Board temperature
    pub board_temp: f64,
}

/// Per-sample series, all the same length
///
/// Altitude, speed, climb rate and temperatures are in the track's output
/// units. Coordinate altitude stays in metres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSamples {
    /// Nominal sample times
    pub time: Vec<DateTime<Utc>>,
    /// Latitudes, decimal degrees
    pub latitude: Vec<f64>,
    /// Longitudes, decimal degrees
    pub longitude: Vec<f64>,
    /// Pressure altitudes plus any offset
    pub altitude: Vec<f64>,
    /// Altitudes used for track coordinates, metres
    pub coord_altitude: Vec<f64>,
    /// GPS altitudes, when reported
    pub gps_altitude: Vec<Option<f64>>,
    /// Barometric pressures, when reported
    pub pressure: Vec<Option<f64>>,
    /// Courses over ground, degrees
    pub course: Vec<f64>,
    /// Reported speeds over ground
    pub speed: Vec<f64>,
    /// Speed from the distance to the previous sample; none for the first
    pub computed_speed: Vec<Option<f64>>,
    /// Rates of climb
    pub climb_rate: Vec<f64>,
    /// Ambient temperatures
    pub ambient_temp: Vec<f64>,
    /// Top temperatures
    pub top_temp: Vec<f64>,
    /// Top minus ambient temperature
    pub temp_diff: Vec<f64>,
    /// Battery voltages
    pub battery: Vec<f64>,
    /// Board temperatures
    pub board_temp: Vec<f64>,
}

impl TrackSamples {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Append one sample to every series
    pub fn push(&mut self, point: TrackPoint) {
        self.time.push(point.time);
        self.latitude.push(point.latitude);
        self.longitude.push(point.longitude);
        self.altitude.push(point.altitude);
        self.coord_altitude.push(point.coord_altitude);
        self.gps_altitude.push(point.gps_altitude);
        self.pressure.push(point.pressure);
        self.course.push(point.course);
        self.speed.push(point.speed);
        self.computed_speed.push(point.computed_speed);
        self.climb_rate.push(point.climb_rate);
        self.ambient_temp.push(point.ambient_temp);
        self.top_temp.push(point.top_temp);
        self.temp_diff.push(point.temp_diff);
        self.battery.push(point.battery);
        self.board_temp.push(point.board_temp);
    }

    /// Sample at an index
    pub fn get(&self, index: usize) -> Option<TrackPoint> {
        Some(TrackPoint {
            time: *self.time.get(index)?,
            latitude: self.latitude[index],
            longitude: self.longitude[index],
            altitude: self.altitude[index],
            coord_altitude: self.coord_altitude[index],
            gps_altitude: self.gps_altitude[index],
            pressure: self.pressure[index],
            course: self.course[index],
            speed: self.speed[index],
            computed_speed: self.computed_speed[index],
            climb_rate: self.climb_rate[index],
            ambient_temp: self.ambient_temp[index],
            top_temp: self.top_temp[index],
            temp_diff: self.temp_diff[index],
            battery: self.battery[index],
            board_temp: self.board_temp[index],
        })
    }
}

/// How a parse ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// END record found with this many GPS samples
    Complete(usize),
    /// END record found but no GPS fix in the log
    NoGpsData,
    /// No END record
    Incomplete,
}

/// A parsed log, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTrack {
    /// Device serial, from the session when known, else the START record
    pub serial_number: String,
    /// Firmware version from the START record
    pub firmware_version: String,
    /// Units of the converted samples
    pub units: UnitSystem,
    /// START record time
    pub start_time: DateTime<Utc>,
    /// END record time, if the log has one
    pub end_time: Option<DateTime<Utc>>,
    /// Time of the first GPS sample
    pub gps_start: Option<DateTime<Utc>>,
    /// Time of the last GPS sample
    pub gps_end: Option<DateTime<Utc>>,
    /// Accepted samples when the END record was found, else -1
    pub status: i32,
    /// How each record was handled
    pub counts: RecordCounts,
    /// Accepted samples
    pub samples: TrackSamples,
    /// Extent of the accepted samples
    pub bounds: BoundingBox,
    /// Sum of distances between consecutive samples, metres
    pub elapsed_distance: f64,
    /// Pressure altitude range including any offset, metres
    pub min_altitude: Option<f64>,
    /// Highest altitude
    pub max_altitude: Option<f64>,
    /// GPS altitude range, metres
    pub min_gps_altitude: Option<f64>,
    /// Highest GPS altitude
    pub max_gps_altitude: Option<f64>,
    /// Highest reported speed over ground, m/s
    pub max_sog: f64,
    /// Highest speed between consecutive samples, m/s
    pub max_computed_sog: f64,
    /// Whether track coordinates use GPS altitude
    pub altitude_from_gps: bool,
    /// First GPS position, `(latitude, longitude)`
    pub start_position: Option<(f64, f64)>,
    /// Last GPS position, `(latitude, longitude)`
    pub end_position: Option<(f64, f64)>,
    /// Note from the log's metadata
    pub track_note: Option<String>,
}

impl ParsedTrack {
    /// Classify the status code
    pub fn outcome(&self) -> TrackStatus {
        match self.status {
            s if s < 0 => TrackStatus::Incomplete,
            0 => TrackStatus::NoGpsData,
            s => TrackStatus::Complete(s as usize),
        }
    }

    /// Whether the log had an END record
    pub fn is_complete(&self) -> bool {
        self.status >= 0
    }

    /// Trip statistics for display
    pub fn summary(&self) -> Option<TrackSummary> {
        TrackSummary::from_track(self)
    }
}
