//! RAD26 Log Identifiers
//!
//! The DBI3 names each stored log by its start and end time. Each time is a
//! 32-bit DOS FAT timestamp written as seven uppercase letters, most
//! significant digit first, where `A` = 0 and `Z` = 25.
//!
//! FAT layout (least significant bits first):
//!
//! | Bits  | Field                  |
//! |-------|------------------------|
//! | 0-4   | seconds / 2            |
//! | 5-10  | minutes                |
//! | 11-15 | hours                  |
//! | 16-20 | day of month           |
//! | 21-24 | month                  |
//! | 25-31 | years since 1980       |

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Number of characters in a RAD26 identifier
pub const RAD26_LEN: usize = 7;

/// First year representable in a FAT timestamp
pub const FAT_EPOCH_YEAR: i32 = 1980;

/// Last year representable in a FAT timestamp (7-bit year field)
pub const FAT_MAX_YEAR: i32 = FAT_EPOCH_YEAR + 0x7F;

/// Resolution of the device clock
pub const TIMESTAMP_RESOLUTION: TimeDelta = TimeDelta::seconds(2);

/// Filename format used for downloaded logs (without extension)
pub const LOG_BASENAME_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Extension of downloaded log files
pub const LOG_EXTENSION: &str = "log";

/// Errors decoding a RAD26 identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rad26Error {
    #[error("malformed identifier '{0}': expected 7 characters")]
    BadLength(String),

    #[error("malformed identifier '{value}': invalid character '{ch}'")]
    BadCharacter { value: String, ch: char },

    #[error("malformed identifier '{0}': value does not fit in 32 bits")]
    Overflow(String),

    #[error("malformed identifier: packed value {packed:#010x} is not a valid date/time")]
    InvalidDate { packed: u32 },

    #[error("malformed catalog line '{0}': expected start and end identifiers")]
    BadPair(String),

    #[error("timestamp {0} is outside the device range 1980-2107")]
    OutOfRange(DateTime<Utc>),
}

/// A device clock reading, UTC with 2-second resolution
///
/// The packed FAT value is kept alongside the calendar time so a decoded
/// identifier always re-encodes to the same string. Comparison, ordering and
/// hashing use the calendar time only.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTimestamp {
    datetime: DateTime<Utc>,
    packed: u32,
}

impl DeviceTimestamp {
    /// The FAT epoch, 1980-01-01 00:00:00 (packed value 0)
    pub fn epoch() -> Self {
        Self {
            datetime: DateTime::<Utc>::UNIX_EPOCH
                .with_year(FAT_EPOCH_YEAR)
                .unwrap_or_default(),
            packed: 0,
        }
    }

    /// Unpack a FAT date/time value.
    ///
    /// An all-zero value is the FAT null date and maps to the epoch; any
    /// other value with a field outside the calendar range is rejected.
    pub fn from_fat(packed: u32) -> Result<Self, Rad26Error> {
        if packed == 0 {
            return Ok(Self::epoch());
        }

        let mut v = packed;
        let second = (v & 0x1F) * 2;
        v >>= 5;
        let minute = v & 0x3F;
        v >>= 6;
        let hour = v & 0x1F;
        v >>= 5;
        let day = v & 0x1F;
        v >>= 5;
        let month = v & 0xF;
        v >>= 4;
        let year = (v & 0x7F) as i32 + FAT_EPOCH_YEAR;

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .map(|naive| Self {
                datetime: naive.and_utc(),
                packed,
            })
            .ok_or(Rad26Error::InvalidDate { packed })
    }

    /// The packed FAT date/time value
    pub fn to_fat(&self) -> u32 {
        self.packed
    }

    /// Build from a calendar time, truncating to the device resolution
    pub fn from_datetime(dt: DateTime<Utc>) -> Result<Self, Rad26Error> {
        if !(FAT_EPOCH_YEAR..=FAT_MAX_YEAR).contains(&dt.year()) {
            return Err(Rad26Error::OutOfRange(dt));
        }
        let truncated = dt
            .with_nanosecond(0)
            .and_then(|d| d.with_second(dt.second() - dt.second() % 2))
            .ok_or(Rad26Error::OutOfRange(dt))?;
        Ok(Self {
            datetime: truncated,
            packed: pack_fat(&truncated),
        })
    }

    /// The calendar time
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    /// Basename of the local log file, `YYYY_MM_DD_HH_MM_SS`
    pub fn log_basename(&self) -> String {
        self.datetime.format(LOG_BASENAME_FORMAT).to_string()
    }

    /// Filename of the local log file, `YYYY_MM_DD_HH_MM_SS.log`
    pub fn log_filename(&self) -> String {
        format!("{}.{}", self.log_basename(), LOG_EXTENSION)
    }
}

impl fmt::Display for DeviceTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl PartialEq for DeviceTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.datetime == other.datetime
    }
}

impl Eq for DeviceTimestamp {}

impl PartialOrd for DeviceTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeviceTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.datetime.cmp(&other.datetime)
    }
}

impl Hash for DeviceTimestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.datetime.hash(state);
    }
}

impl Serialize for DeviceTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.datetime.serialize(serializer)
    }
}

// Year must already be within FAT_EPOCH_YEAR..=FAT_MAX_YEAR.
fn pack_fat(dt: &DateTime<Utc>) -> u32 {
    let year = (dt.year() - FAT_EPOCH_YEAR) as u32;
    (year << 25)
        | (dt.month() << 21)
        | (dt.day() << 16)
        | (dt.hour() << 11)
        | (dt.minute() << 5)
        | (dt.second() / 2)
}

impl FromStr for DeviceTimestamp {
    type Err = Rad26Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Convert a RAD26 string to its integer value
pub fn radix26_to_int(rad26: &str) -> Result<u32, Rad26Error> {
    if rad26.len() != RAD26_LEN {
        return Err(Rad26Error::BadLength(rad26.to_string()));
    }

    let mut value: u64 = 0;
    for ch in rad26.chars() {
        if !ch.is_ascii_uppercase() {
            return Err(Rad26Error::BadCharacter {
                value: rad26.to_string(),
                ch,
            });
        }
        value = value * 26 + (ch as u64 - 'A' as u64);
    }

    u32::try_from(value).map_err(|_| Rad26Error::Overflow(rad26.to_string()))
}

/// Convert an integer to its 7-character RAD26 string
pub fn int_to_radix26(mut value: u32) -> String {
    let mut digits = [b'A'; RAD26_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = b'A' + (value % 26) as u8;
        value /= 26;
    }
    digits.iter().map(|&b| b as char).collect()
}

/// Decode a RAD26 identifier into a timestamp
pub fn decode(rad26: &str) -> Result<DeviceTimestamp, Rad26Error> {
    DeviceTimestamp::from_fat(radix26_to_int(rad26)?)
}

/// Encode a timestamp as a RAD26 identifier
pub fn encode(timestamp: &DeviceTimestamp) -> String {
    int_to_radix26(timestamp.to_fat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_all_a_is_fat_epoch() {
        assert_eq!(radix26_to_int("AAAAAAA"), Ok(0));
        let ts = decode("AAAAAAA").unwrap();
        assert_eq!(ts.datetime(), Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(ts.to_fat(), 0);
        assert_eq!(encode(&ts), "AAAAAAA");
    }

    #[test]
    fn test_epoch_compares_equal_to_packed_date() {
        let null = decode("AAAAAAA").unwrap();
        let packed = DeviceTimestamp::from_datetime(null.datetime()).unwrap();
        assert_eq!(null, packed);
        assert_ne!(packed.to_fat(), 0);
        assert_eq!(decode(&encode(&packed)).unwrap(), packed);
    }

    #[test]
    fn test_zero_day_rejected() {
        // month 1, day 0
        assert!(matches!(
            decode(&int_to_radix26(1 << 21)),
            Err(Rad26Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_known_identifier() {
        let ts = DeviceTimestamp::from_datetime(Utc.with_ymd_and_hms(2020, 6, 14, 17, 3, 42).unwrap())
            .unwrap();
        let name = encode(&ts);
        assert_eq!(name.len(), RAD26_LEN);
        assert_eq!(decode(&name).unwrap(), ts);
        assert_eq!(ts.log_filename(), "2020_06_14_17_03_42.log");
    }

    #[test]
    fn test_odd_seconds_truncate() {
        let ts = DeviceTimestamp::from_datetime(Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap())
            .unwrap();
        assert_eq!(ts.datetime().second(), 4);
    }

    #[test]
    fn test_rejects_lowercase_and_length() {
        assert!(matches!(
            radix26_to_int("aBCDEFG"),
            Err(Rad26Error::BadCharacter { ch: 'a', .. })
        ));
        assert!(matches!(radix26_to_int("ABC"), Err(Rad26Error::BadLength(_))));
        assert!(matches!(radix26_to_int("ZZZZZZZ"), Err(Rad26Error::Overflow(_))));
    }

    #[test]
    fn test_rejects_invalid_month() {
        // month 13, day 1
        let packed = (13 << 21) | (1 << 16);
        assert!(matches!(
            decode(&int_to_radix26(packed)),
            Err(Rad26Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_int_round_trip() {
        for value in [0u32, 1, 25, 26, 675, 0x4ACE_2D35, u32::MAX] {
            assert_eq!(radix26_to_int(&int_to_radix26(value)), Ok(value));
        }
    }

    #[test]
    fn test_serializes_as_calendar_time() {
        let ts = DeviceTimestamp::from_datetime(Utc.with_ymd_and_hms(2020, 6, 14, 17, 3, 42).unwrap())
            .unwrap();
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2020-06-14T17:03:42Z\""
        );
    }

    #[test]
    fn test_year_out_of_range() {
        let dt = Utc.with_ymd_and_hms(1979, 12, 31, 23, 59, 58).unwrap();
        assert!(matches!(
            DeviceTimestamp::from_datetime(dt),
            Err(Rad26Error::OutOfRange(_))
        ));
    }
}
