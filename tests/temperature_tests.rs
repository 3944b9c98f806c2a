use fujitsu_hvac::{FanSpeed, Mode, SettingsChange, Temperature};

#[test]
fn from_celsius() {
    let t = Temperature::from_celsius(22.0);
    assert_eq!(t.celsius(), 22.0);
}

#[test]
fn status_tenths() {
    assert_eq!(Temperature::from_tenths(225).celsius(), 22.5);
    assert_eq!(Temperature::from_tenths(180).celsius(), 18.0);
}

#[test]
fn command_half_degrees() {
    assert_eq!(Temperature::from_celsius(21.5).to_half_degrees(), 43);
    assert_eq!(Temperature::from_celsius(18.0).to_half_degrees(), 36);
    assert_eq!(Temperature::from_celsius(22.25).to_half_degrees(), 45);
}

#[test]
fn rounding_to_controller_precision() {
    assert_eq!(Temperature::from_celsius(22.3).rounded().celsius(), 22.5);
    assert_eq!(Temperature::from_celsius(22.1).rounded().celsius(), 22.0);
}

#[test]
fn display() {
    let t = Temperature::from_celsius(22.5);
    assert_eq!(format!("{t}"), "22.5\u{00b0}C");
}

#[test]
fn heat_codes_differ_between_read_and_write() {
    assert_eq!(Mode::from_status_code(2), Some(Mode::Heat));
    assert_eq!(Mode::Heat.to_command_code(), Some(4));
}

#[test]
fn fan_code_roundtrip() {
    for speed in [
        FanSpeed::Min,
        FanSpeed::Mid,
        FanSpeed::Max,
        FanSpeed::Auto,
        FanSpeed::Off,
    ] {
        assert_eq!(FanSpeed::from_code(speed.code()), Some(speed));
    }
}

#[test]
fn settings_change_builder() {
    let change = SettingsChange::new().power(true).mode(Mode::Dry);
    assert_eq!(change.power, Some(true));
    assert_eq!(change.mode, Some(Mode::Dry));
    assert!(change.fan_speed.is_none());
    assert!(change.temperature.is_none());
    assert!(!change.is_empty());
    assert!(SettingsChange::new().is_empty());
}
