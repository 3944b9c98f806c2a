use std::sync::Arc;

use crate::Result;
use crate::coordinator::Coordinator;
use crate::types::{Mode, SettingsChange, UnitIdentity, UnitState};

/// Setpoint step in °C.
pub const PRECISION: f64 = 0.5;

/// Operating mode as presented to a thermostat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Dry,
}

impl HvacMode {
    pub const ALL: [HvacMode; 4] = [HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::Dry];

    /// An unpowered unit is Off whatever mode it was left in.
    pub fn from_state(state: &UnitState) -> Self {
        if !state.powered {
            return HvacMode::Off;
        }
        match state.mode {
            Mode::Cool => HvacMode::Cool,
            Mode::Heat => HvacMode::Heat,
            Mode::Dry => HvacMode::Dry,
            Mode::Off => HvacMode::Off,
        }
    }

    pub fn to_change(self) -> SettingsChange {
        match self {
            HvacMode::Off => SettingsChange::new().power(false),
            HvacMode::Heat => SettingsChange::new().power(true).mode(Mode::Heat),
            HvacMode::Cool => SettingsChange::new().power(true).mode(Mode::Cool),
            HvacMode::Dry => SettingsChange::new().power(true).mode(Mode::Dry),
        }
    }
}

/// Thermostat view of one unit, backed by the coordinator's snapshot.
pub struct Climate {
    coordinator: Arc<Coordinator>,
    identity: UnitIdentity,
}

impl Climate {
    pub fn new(coordinator: Arc<Coordinator>, identity: UnitIdentity) -> Self {
        Self {
            coordinator,
            identity,
        }
    }

    /// One climate per unit currently in the coordinator's snapshot.
    pub async fn for_all(coordinator: &Arc<Coordinator>) -> Vec<Climate> {
        coordinator
            .data()
            .await
            .iter()
            .map(|u| Climate::new(Arc::clone(coordinator), u.identity))
            .collect()
    }

    pub fn identity(&self) -> UnitIdentity {
        self.identity
    }

    pub fn unique_id(&self) -> String {
        format!("{}{}", self.identity.circuit, self.identity.sub_id)
    }

    pub fn supported_modes(&self) -> &'static [HvacMode] {
        &HvacMode::ALL
    }

    pub async fn state(&self) -> Option<UnitState> {
        self.coordinator.unit(self.identity).await
    }

    pub async fn is_available(&self) -> bool {
        self.coordinator.is_available() && self.state().await.is_some()
    }

    pub async fn hvac_mode(&self) -> HvacMode {
        self.state()
            .await
            .map_or(HvacMode::Off, |s| HvacMode::from_state(&s))
    }

    pub async fn target_temperature(&self) -> Option<f64> {
        self.state().await.map(|s| s.target_temperature.celsius())
    }

    // The controller reports no room temperature, only the setpoint.
    pub async fn current_temperature(&self) -> Option<f64> {
        self.target_temperature().await
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<()> {
        self.apply(mode.to_change()).await
    }

    /// Power on, keeping whatever mode the unit was in.
    pub async fn turn_on(&self) -> Result<()> {
        self.apply(SettingsChange::new().power(true)).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.apply(SettingsChange::new().power(false)).await
    }

    pub async fn set_temperature(&self, celsius: f64) -> Result<()> {
        self.apply(SettingsChange::new().temperature(celsius)).await
    }

    async fn apply(&self, change: SettingsChange) -> Result<()> {
        self.coordinator
            .client()
            .apply_settings(self.identity, change)
            .await?;
        self.coordinator.patch(self.identity, &change).await;
        Ok(())
    }
}
