use dbi3_core::unit_conversion::{
    celsius_to_fahrenheit, fahrenheit_to_celsius, feet_to_meters, meters_to_feet,
    meters_to_miles, mps_to_fpm, mps_to_mph, round_to, UnitSystem,
};

#[test]
fn test_celsius_to_fahrenheit() {
    assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
    assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
    assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
}

#[test]
fn test_fahrenheit_to_celsius() {
    assert_eq!(fahrenheit_to_celsius(32.0), 0.0);
    assert_eq!(fahrenheit_to_celsius(212.0), 100.0);
}

#[test]
fn test_altitude_round_trip() {
    let meters = 1523.4;
    assert!((feet_to_meters(meters_to_feet(meters)) - meters).abs() < 1e-9);
}

#[test]
fn test_distance_to_miles() {
    // 1609.344 m is one statute mile
    assert!((meters_to_miles(1609.344) - 1.0).abs() < 1e-4);
}

#[test]
fn test_vario_units() {
    assert_eq!(round_to(mps_to_fpm(2.5), 1), 492.1);
    assert_eq!(round_to(mps_to_mph(12.0), 1), 26.8);
}

#[test]
fn test_unit_system_labels() {
    let imperial = UnitSystem::from_metric(false);
    assert!(!imperial.is_metric());
    assert_eq!(imperial.altitude_label(), "ft");
    assert_eq!(imperial.speed_label(), "MPH");
    assert_eq!(imperial.climb_rate_label(), "FPM");
    assert_eq!(imperial.distance_label(), "mi");

    let metric = UnitSystem::default();
    assert_eq!(metric.temperature_label(), "C");
    assert_eq!(metric.distance(1000.0), 1000.0);
}
