use std::fmt;

use serde::{Deserialize, Serialize};

/// Temperature in Celsius. The controller works in half degrees.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    /// Status records carry the setpoint in tenths of a degree.
    pub fn from_tenths(raw: i64) -> Self {
        Self(raw as f64 / 10.0)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    /// Commands carry the setpoint in half-degree units.
    pub fn to_half_degrees(&self) -> i64 {
        (self.0 * 2.0).round() as i64
    }

    /// Round to controller precision (0.5 increments).
    pub fn rounded(&self) -> Self {
        Self((self.0 * 2.0).round() / 2.0)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Cool,
    Dry,
    Heat,
    Off,
}

impl Mode {
    /// Mode code as reported by the monitoring endpoint.
    pub fn from_status_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Mode::Cool),
            1 => Some(Mode::Dry),
            2 => Some(Mode::Heat),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u8> {
        match self {
            Mode::Cool => Some(0),
            Mode::Dry => Some(1),
            Mode::Heat => Some(2),
            Mode::Off => None,
        }
    }

    /// Mode code expected by `command.cgi`. Not the same table as the
    /// status codes; Off is expressed through the power field instead.
    pub fn to_command_code(&self) -> Option<u8> {
        match self {
            Mode::Cool => Some(2),
            Mode::Dry => Some(3),
            Mode::Heat => Some(4),
            Mode::Off => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FanSpeed {
    Min,
    Mid,
    Max,
    Auto,
    Off,
}

impl FanSpeed {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            8 => Some(FanSpeed::Min),
            5 => Some(FanSpeed::Mid),
            2 => Some(FanSpeed::Max),
            1 => Some(FanSpeed::Auto),
            0 => Some(FanSpeed::Off),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FanSpeed::Min => 8,
            FanSpeed::Mid => 5,
            FanSpeed::Max => 2,
            FanSpeed::Auto => 1,
            FanSpeed::Off => 0,
        }
    }
}

/// Addressing pair of one indoor unit, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitIdentity {
    pub circuit: u32,
    pub sub_id: u32,
}

impl UnitIdentity {
    pub fn new(circuit: u32, sub_id: u32) -> Self {
        Self { circuit, sub_id }
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.circuit, self.sub_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub identity: UnitIdentity,
    pub powered: bool,
    pub mode: Mode,
    pub target_temperature: Temperature,
    pub fan_speed: FanSpeed,
    pub louver: i32,
}

/// Sparse update for one unit. `None` fields are left at their current
/// device value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsChange {
    pub power: Option<bool>,
    pub mode: Option<Mode>,
    pub fan_speed: Option<FanSpeed>,
    pub temperature: Option<Temperature>,
}

impl SettingsChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(mut self, on: bool) -> Self {
        self.power = Some(on);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn fan_speed(mut self, speed: FanSpeed) -> Self {
        self.fan_speed = Some(speed);
        self
    }

    pub fn temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(Temperature::from_celsius(celsius));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.mode.is_none()
            && self.fan_speed.is_none()
            && self.temperature.is_none()
    }

    /// Apply this change to a cached state, as an optimistic update.
    pub fn apply_to(&self, state: &mut UnitState) {
        if let Some(on) = self.power {
            state.powered = on;
        }
        if let Some(mode) = self.mode {
            state.mode = mode;
        }
        if let Some(speed) = self.fan_speed {
            state.fan_speed = speed;
        }
        if let Some(temp) = self.temperature {
            state.target_temperature = temp.rounded();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_mode_tables_differ() {
        for mode in [Mode::Cool, Mode::Dry, Mode::Heat] {
            assert_ne!(mode.status_code(), mode.to_command_code(), "{mode:?}");
        }
        assert_eq!(Mode::Heat.status_code(), Some(2));
        assert_eq!(Mode::Heat.to_command_code(), Some(4));
        assert_eq!(Mode::Off.to_command_code(), None);
    }

    #[test]
    fn status_mode_codes() {
        assert_eq!(Mode::from_status_code(0), Some(Mode::Cool));
        assert_eq!(Mode::from_status_code(1), Some(Mode::Dry));
        assert_eq!(Mode::from_status_code(2), Some(Mode::Heat));
        assert_eq!(Mode::from_status_code(3), None);
    }

    #[test]
    fn fan_codes() {
        assert_eq!(FanSpeed::from_code(8), Some(FanSpeed::Min));
        assert_eq!(FanSpeed::from_code(5), Some(FanSpeed::Mid));
        assert_eq!(FanSpeed::from_code(2), Some(FanSpeed::Max));
        assert_eq!(FanSpeed::from_code(1), Some(FanSpeed::Auto));
        assert_eq!(FanSpeed::from_code(0), Some(FanSpeed::Off));
        assert_eq!(FanSpeed::from_code(3), None);
    }

    #[test]
    fn half_degree_encoding() {
        assert_eq!(Temperature::from_celsius(21.5).to_half_degrees(), 43);
        assert_eq!(Temperature::from_celsius(22.3).to_half_degrees(), 45);
        assert_eq!(Temperature::from_tenths(215).celsius(), 21.5);
    }

    #[test]
    fn apply_to_only_touches_set_fields() {
        let mut state = UnitState {
            identity: UnitIdentity::new(0, 1),
            powered: false,
            mode: Mode::Cool,
            target_temperature: Temperature::from_celsius(24.0),
            fan_speed: FanSpeed::Auto,
            louver: 3,
        };
        SettingsChange::new().temperature(21.3).apply_to(&mut state);
        assert_eq!(state.target_temperature.celsius(), 21.5);
        assert!(!state.powered);
        assert_eq!(state.mode, Mode::Cool);
        assert_eq!(state.fan_speed, FanSpeed::Auto);
    }
}
