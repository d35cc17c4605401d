//! Trip computer statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ParsedTrack, RecordCounts};
use crate::unit_conversion::UnitSystem;

/// A duration split for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedTime {
    /// Hours
    pub hours: i64,
    /// Minutes
    pub minutes: i64,
    /// Seconds
    pub seconds: i64,
}

impl ElapsedTime {
    /// Split a number of seconds
    pub fn from_seconds(total: i64) -> Self {
        Self {
            hours: total / 3600,
            minutes: total % 3600 / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Summary of a track's GPS span, in the track's output units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    /// Units of the values below
    pub units: UnitSystem,
    /// Serial number
    pub serial_number: String,
    /// Firmware version
    pub firmware_version: String,
    /// Note from the log metadata
    pub track_note: Option<String>,
    /// Metres, or miles for imperial
    pub distance: f64,
    /// Altitude range over the track
    pub min_altitude: f64,
    /// Highest altitude
    pub max_altitude: f64,
    /// Distance over the GPS time span
    pub average_speed: f64,
    /// Highest speed between consecutive samples
    pub max_speed: f64,
    /// Highest speed reported by the device
    pub max_sog: f64,
    /// First GPS sample
    pub gps_start: DateTime<Utc>,
    /// Last GPS sample
    pub gps_end: DateTime<Utc>,
    /// GPS time span
    pub elapsed: ElapsedTime,
    /// Record counts from the parse
    pub counts: RecordCounts,
}

impl TrackSummary {
    /// Summarize a track; `None` when it has no GPS samples
    pub fn from_track(track: &ParsedTrack) -> Option<Self> {
        let gps_start = track.gps_start?;
        let gps_end = track.gps_end?;
        let units = track.units;

        let span = (gps_end - gps_start).num_seconds();
        let average_mps = if span > 0 {
            track.elapsed_distance / span as f64
        } else {
            0.0
        };

        Some(Self {
            units,
            serial_number: track.serial_number.clone(),
            firmware_version: track.firmware_version.clone(),
            track_note: track.track_note.clone(),
            distance: units.distance(track.elapsed_distance),
            min_altitude: units.altitude(track.min_altitude?),
            max_altitude: units.altitude(track.max_altitude?),
            average_speed: units.speed(average_mps),
            max_speed: units.speed(track.max_computed_sog),
            max_sog: units.speed(track.max_sog),
            gps_start,
            gps_end,
            elapsed: ElapsedTime::from_seconds(span),
            counts: track.counts,
        })
    }

    /// Human readable lines, one statistic each
    pub fn report_lines(&self) -> Vec<String> {
        let u = &self.units;
        let mut lines = Vec::new();
        if let Some(note) = &self.track_note {
            lines.push(note.clone());
        }
        lines.extend([
            format!("Distance {:.2} {}", self.distance, u.distance_label()),
            format!("Min Alt {:.2} {}", self.min_altitude, u.altitude_label()),
            format!("Max Alt {:.2} {}", self.max_altitude, u.altitude_label()),
            format!("Avg Speed {:.2} {}", self.average_speed, u.speed_label()),
            format!(
                "Max Speed {:.2}(SOG {:.2}) {}",
                self.max_speed,
                self.max_sog,
                u.speed_label()
            ),
            format!("Start Time {}", self.gps_start.format("%Y-%m-%dT%H:%M:%S")),
            format!("End Time {}", self.gps_end.format("%Y-%m-%dT%H:%M:%S")),
            format!("Elapsed {}", self.elapsed),
            format!("DBI3  {}  FWVER {}", self.serial_number, self.firmware_version),
        ]);
        lines
    }
}

impl fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.report_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
