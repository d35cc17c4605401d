//! Unit Conversion Functions
//!
//! The DBI3 logs in metric units:
//! - Temperature: °C
//! - Altitude: metres
//! - Speed over ground: metres per second
//! - Rate of climb: metres per second
//!
//! Imperial output uses °F, feet, miles per hour and feet per minute.

use serde::{Deserialize, Serialize};

const FEET_PER_METER: f64 = 3.28084;
const MILES_PER_METER: f64 = 0.000621371;

/// Output unit system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSystem {
    /// °C, metres, m/s
    #[default]
    Metric,
    /// °F, feet, mph, ft/min
    Imperial,
}

impl UnitSystem {
    /// Metric when `metric` is true, imperial otherwise
    pub fn from_metric(metric: bool) -> Self {
        if metric {
            UnitSystem::Metric
        } else {
            UnitSystem::Imperial
        }
    }

    /// Whether this is the metric system
    pub fn is_metric(&self) -> bool {
        *self == UnitSystem::Metric
    }

    /// Temperature from °C
    pub fn temperature(&self, celsius: f64) -> f64 {
        match self {
            UnitSystem::Metric => celsius,
            UnitSystem::Imperial => celsius_to_fahrenheit(celsius),
        }
    }

    /// Altitude from metres
    pub fn altitude(&self, meters: f64) -> f64 {
        match self {
            UnitSystem::Metric => meters,
            UnitSystem::Imperial => meters_to_feet(meters),
        }
    }

    /// Ground speed from m/s
    pub fn speed(&self, mps: f64) -> f64 {
        match self {
            UnitSystem::Metric => mps,
            UnitSystem::Imperial => mps_to_mph(mps),
        }
    }

    /// Climb rate from m/s
    pub fn climb_rate(&self, mps: f64) -> f64 {
        match self {
            UnitSystem::Metric => mps,
            UnitSystem::Imperial => mps_to_fpm(mps),
        }
    }

    /// Distance from metres
    pub fn distance(&self, meters: f64) -> f64 {
        match self {
            UnitSystem::Metric => meters,
            UnitSystem::Imperial => meters_to_miles(meters),
        }
    }

    /// Temperature unit label
    pub fn temperature_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "C",
            UnitSystem::Imperial => "F",
        }
    }

    /// Altitude unit label
    pub fn altitude_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "m",
            UnitSystem::Imperial => "ft",
        }
    }

    /// Speed unit label
    pub fn speed_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "mps",
            UnitSystem::Imperial => "MPH",
        }
    }

    /// Climb rate unit label
    pub fn climb_rate_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "mps",
            UnitSystem::Imperial => "FPM",
        }
    }

    /// Distance unit label
    pub fn distance_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "m",
            UnitSystem::Imperial => "mi",
        }
    }
}

/// Convert Celsius to Fahrenheit
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius
pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Convert metres to feet
pub fn meters_to_feet(m: f64) -> f64 {
    m * FEET_PER_METER
}

/// Convert feet to metres
pub fn feet_to_meters(ft: f64) -> f64 {
    ft / FEET_PER_METER
}

/// Convert metres to statute miles
pub fn meters_to_miles(m: f64) -> f64 {
    m * MILES_PER_METER
}

/// Convert m/s to miles per hour
pub fn mps_to_mph(mps: f64) -> f64 {
    meters_to_miles(mps * 3600.0)
}

/// Convert m/s to feet per minute
pub fn mps_to_fpm(mps: f64) -> f64 {
    meters_to_feet(mps * 60.0)
}

/// Round to a number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
