//! START/DATA/END state machine

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use tracing::{debug, info, warn};

use super::geo::{haversine_distance, BoundingBox};
use super::record::{DataRecord, Record, RecordError, DATA_FIELDS, END_FIELDS, GPS_FIX, START_FIELDS};
use super::{
    ParseError, ParsedTrack, RecordCounts, RecordOutcome, TrackPoint, TrackSamples,
    MISSING_TOP_TEMP_C, MISSING_TOP_TEMP_F, SAMPLE_INTERVAL,
};
use crate::config::ConversionOptions;
use crate::unit_conversion::{round_to, UnitSystem};

/// Parser for one downloaded log
#[derive(Debug, Clone, Copy)]
pub struct FlightLog<'a> {
    options: &'a ConversionOptions,
    serial_number: Option<&'a str>,
}

impl<'a> FlightLog<'a> {
    /// Parser converting with `options`
    pub fn new(options: &'a ConversionOptions) -> Self {
        Self {
            options,
            serial_number: None,
        }
    }

    /// Use this serial number instead of the START record's.
    ///
    /// Firmware 1.2 wrote a placeholder serial into the log header, so the
    /// one reported by the device itself is preferred when available.
    pub fn with_serial_number(mut self, serial_number: &'a str) -> Self {
        self.serial_number = Some(serial_number);
        self
    }

    /// Parse a log file
    pub fn parse(
        path: &Path,
        options: &ConversionOptions,
        serial_number: Option<&str>,
    ) -> Result<ParsedTrack, ParseError> {
        let mut parser = FlightLog::new(options);
        parser.serial_number = serial_number;
        parser.parse_file(path)
    }

    /// Parse the log at `path`
    pub fn parse_file(&self, path: &Path) -> Result<ParsedTrack, ParseError> {
        debug!("Parsing log {}", path.display());
        let file = File::open(path)?;
        self.parse_reader(BufReader::new(file))
    }

    /// Parse a log held in memory
    pub fn parse_str(&self, text: &str) -> Result<ParsedTrack, ParseError> {
        self.parse_reader(Cursor::new(text))
    }

    /// Parse a log from any line source.
    ///
    /// Lines are split on `\n` as raw bytes so a line that is not valid
    /// UTF-8 is counted as bad instead of failing the whole log.
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<ParsedTrack, ParseError> {
        let mut lines = reader.split(b'\n');

        let start_line = loop {
            match lines.next() {
                Some(bytes) => {
                    let line = String::from_utf8(bytes?).map_err(|_| {
                        ParseError::MalformedStartRecord("start record is not valid UTF-8".into())
                    })?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Err(ParseError::MalformedStartRecord("log is empty".into())),
            }
        };

        let start = Record::parse(start_line.trim())
            .map_err(|e| ParseError::MalformedStartRecord(e.to_string()))?;
        if let Some(missing) = start.missing_field(START_FIELDS) {
            return Err(ParseError::MalformedStartRecord(format!(
                "missing field {}",
                missing
            )));
        }
        let start_time = start.timestamp().ok_or_else(|| {
            ParseError::MalformedStartRecord(format!(
                "invalid DATE/TIME in '{}'",
                start_line.trim()
            ))
        })?;

        let firmware_version = start.get("FWVER").unwrap_or_default().to_string();
        let serial_number = self
            .serial_number
            .or_else(|| start.get("SN"))
            .unwrap_or_default()
            .to_string();
        debug!(
            "Log start {} from {} firmware {}",
            start_time, serial_number, firmware_version
        );

        let mut track = TrackBuilder::new(self.options, start_time);
        track.counts.total += 1;
        let mut end_time = None;

        for bytes in lines {
            let bytes = bytes?;
            let line = match std::str::from_utf8(&bytes) {
                Ok(line) => line.trim(),
                Err(_) => {
                    track.counts.total += 1;
                    warn!(
                        "Skipping record '{}': {}",
                        String::from_utf8_lossy(&bytes).trim(),
                        RecordError::InvalidEncoding
                    );
                    track.tick();
                    track.counts.record(&RecordOutcome::Bad(RecordError::InvalidEncoding));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            track.counts.total += 1;

            let record = match Record::parse(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping record '{}': {}", line, e);
                    track.tick();
                    track.counts.record(&RecordOutcome::Bad(e));
                    continue;
                }
            };

            if record.has_date() {
                match (record.missing_field(END_FIELDS), record.timestamp()) {
                    (None, Some(time)) => end_time = Some(time),
                    (Some(missing), _) => warn!("End record missing field {}", missing),
                    (None, None) => warn!("End record has invalid DATE/TIME: '{}'", line),
                }
                break;
            }

            let outcome = track.add(&record);
            if let RecordOutcome::Bad(e) = &outcome {
                warn!("Skipping data record '{}': {}", line, e);
            }
            track.counts.record(&outcome);
        }

        let parsed = track.finish(serial_number, firmware_version, end_time);
        info!(
            "Parsed log {}: total={} data={} trimmed={} bad={} no fix={} status={}",
            start_time,
            parsed.counts.total,
            parsed.counts.data,
            parsed.counts.trimmed,
            parsed.counts.bad,
            parsed.counts.no_fix,
            parsed.status
        );
        Ok(parsed)
    }
}

/// Running state while DATA records are consumed
struct TrackBuilder<'a> {
    options: &'a ConversionOptions,
    units: UnitSystem,
    start_time: DateTime<Utc>,
    /// Nominal time of the next DATA record
    clock: DateTime<Utc>,
    counts: RecordCounts,
    samples: TrackSamples,
    bounds: BoundingBox,
    last_position: Option<(f64, f64)>,
    start_position: Option<(f64, f64)>,
    gps_start: Option<DateTime<Utc>>,
    gps_end: Option<DateTime<Utc>>,
    elapsed_distance: f64,
    min_altitude: Option<f64>,
    max_altitude: Option<f64>,
    min_gps_altitude: Option<f64>,
    max_gps_altitude: Option<f64>,
    max_sog: f64,
    max_computed_sog: f64,
    /// Decided by the first accepted record
    altitude_from_gps: Option<bool>,
}

impl<'a> TrackBuilder<'a> {
    fn new(options: &'a ConversionOptions, start_time: DateTime<Utc>) -> Self {
        Self {
            options,
            units: options.units,
            start_time,
            clock: start_time,
            counts: RecordCounts::default(),
            samples: TrackSamples::default(),
            bounds: BoundingBox::default(),
            last_position: None,
            start_position: None,
            gps_start: None,
            gps_end: None,
            elapsed_distance: 0.0,
            min_altitude: None,
            max_altitude: None,
            min_gps_altitude: None,
            max_gps_altitude: None,
            max_sog: 0.0,
            max_computed_sog: 0.0,
            altitude_from_gps: None,
        }
    }

    /// Advance the clock past one DATA line, returning its time
    fn tick(&mut self) -> DateTime<Utc> {
        let time = self.clock;
        self.clock += SAMPLE_INTERVAL;
        time
    }

    fn in_trim_window(&self, time: DateTime<Utc>) -> bool {
        let after_start = self.options.trim_start_time.map_or(true, |start| time >= start);
        let before_end = self.options.trim_end_time.map_or(true, |end| time <= end);
        after_start && before_end
    }

    fn add(&mut self, record: &Record<'_>) -> RecordOutcome {
        let time = self.tick();

        if let Some(missing) = record.missing_field(DATA_FIELDS) {
            return RecordOutcome::Bad(RecordError::MissingField(missing));
        }
        if record.get("GPSS") != Some(GPS_FIX) {
            return RecordOutcome::NoFix;
        }
        if !self.in_trim_window(time) {
            return RecordOutcome::Trimmed;
        }

        match DataRecord::from_record(record) {
            Ok(data) => {
                self.accept(time, data);
                RecordOutcome::Accepted
            }
            Err(e) => RecordOutcome::Bad(e),
        }
    }

    fn accept(&mut self, time: DateTime<Utc>, data: DataRecord) {
        let units = self.units;
        let position = (data.latitude, data.longitude);
        self.bounds.extend(data.latitude, data.longitude);

        let altitude = data.altitude + self.options.altitude_offset.unwrap_or(0.0);
        self.min_altitude = Some(self.min_altitude.map_or(altitude, |m| m.min(altitude)));
        self.max_altitude = Some(self.max_altitude.map_or(altitude, |m| m.max(altitude)));

        let from_gps = *self
            .altitude_from_gps
            .get_or_insert(data.gps_altitude.is_some() && self.options.prefer_gps);
        if let Some(gps) = data.gps_altitude {
            self.min_gps_altitude = Some(self.min_gps_altitude.map_or(gps, |m| m.min(gps)));
            self.max_gps_altitude = Some(self.max_gps_altitude.map_or(gps, |m| m.max(gps)));
        }
        let coord_altitude = match data.gps_altitude {
            Some(gps) if from_gps => gps,
            _ => altitude,
        };

        let computed_speed = self.last_position.map(|last| {
            let distance = haversine_distance(last, position);
            self.elapsed_distance += distance;
            let speed = distance / SAMPLE_INTERVAL.num_seconds() as f64;
            self.max_computed_sog = self.max_computed_sog.max(speed);
            speed
        });
        self.last_position = Some(position);
        self.max_sog = self.max_sog.max(data.speed);

        let ambient_temp = round_to(units.temperature(data.ambient_temp), 1);
        let top_temp = match data.top_temp {
            Some(celsius) => round_to(units.temperature(celsius), 1),
            None if units.is_metric() => MISSING_TOP_TEMP_C,
            None => MISSING_TOP_TEMP_F,
        };

        self.samples.push(TrackPoint {
            time,
            latitude: data.latitude,
            longitude: data.longitude,
            altitude: round_to(units.altitude(altitude), 1),
            coord_altitude,
            gps_altitude: data.gps_altitude.map(|g| round_to(units.altitude(g), 1)),
            pressure: data.pressure.map(|p| round_to(p, 2)),
            course: round_to(data.course, 1),
            speed: round_to(units.speed(data.speed), 1),
            computed_speed: computed_speed.map(|s| round_to(units.speed(s), 1)),
            climb_rate: round_to(units.climb_rate(data.climb_rate), 1),
            ambient_temp,
            top_temp,
            temp_diff: round_to(top_temp - ambient_temp, 1),
            battery: round_to(data.battery, 2),
            board_temp: round_to(units.temperature(data.board_temp), 2),
        });

        if self.gps_start.is_none() {
            self.gps_start = Some(time);
            self.start_position = Some(position);
        }
        self.gps_end = Some(time);
    }

    fn finish(
        self,
        serial_number: String,
        firmware_version: String,
        end_time: Option<DateTime<Utc>>,
    ) -> ParsedTrack {
        let status = match end_time {
            Some(_) => self.samples.len() as i32,
            None => -1,
        };

        ParsedTrack {
            serial_number,
            firmware_version,
            units: self.units,
            start_time: self.start_time,
            end_time,
            gps_start: self.gps_start,
            gps_end: self.gps_end,
            status,
            counts: self.counts,
            samples: self.samples,
            bounds: self.bounds,
            elapsed_distance: self.elapsed_distance,
            min_altitude: self.min_altitude,
            max_altitude: self.max_altitude,
            min_gps_altitude: self.min_gps_altitude,
            max_gps_altitude: self.max_gps_altitude,
            max_sog: self.max_sog,
            max_computed_sog: self.max_computed_sog,
            altitude_from_gps: self.altitude_from_gps.unwrap_or(false),
            start_position: self.start_position,
            end_position: self.last_position,
            track_note: self.options.track_note.clone(),
        }
    }
}
