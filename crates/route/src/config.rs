//! Tunable knobs (§6 "Configuration options").

use serde::Deserialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum EnergyType {
    #[serde(rename = "extended_set")]
    ExtendedSet,
    #[serde(rename = "exponential")]
    Exponential,
}

impl Default for EnergyType {
    fn default() -> Self {
        EnergyType::ExtendedSet
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub energy_type: EnergyType,

    /// Read by the external interface contract but unused by the default
    /// `extended_set` energy mode (Open Question (b), §9 of the design:
    /// kept for parity with the documented config surface, wired to
    /// nothing here).
    pub decay_factor: f64,
    pub decay_reset: u32,

    pub optimize_initial: bool,
    pub initial_layout_hun_like: bool,

    pub teleport_bonus: f64,
    pub telegate_bonus: f64,

    pub safety_valve_iters: u32,
    pub max_solving_deadlock_iterations: u32,

    pub extended_set_size: usize,
    pub full_core_penalty: f64,

    pub swap_decay: f64,
    pub teleport_decay: f64,
    pub telegate_decay: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            energy_type: EnergyType::ExtendedSet,
            decay_factor: 0.9,
            decay_reset: 5,
            optimize_initial: false,
            initial_layout_hun_like: true,
            teleport_bonus: 100.0,
            telegate_bonus: 100.0,
            safety_valve_iters: 100,
            max_solving_deadlock_iterations: 300,
            extended_set_size: 20,
            full_core_penalty: 10.0,
            swap_decay: 0.002,
            teleport_decay: 0.005,
            telegate_decay: 0.005,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.energy_type, EnergyType::ExtendedSet);
        assert_eq!(cfg.safety_valve_iters, 100);
        assert_eq!(cfg.max_solving_deadlock_iterations, 300);
        assert_eq!(cfg.extended_set_size, 20);
    }

    #[test]
    fn partial_json_overlay_keeps_remaining_defaults() {
        let cfg = Config::from_json_str(r#"{"teleport_bonus": 50.0}"#).unwrap();
        assert_eq!(cfg.teleport_bonus, 50.0);
        assert_eq!(cfg.telegate_bonus, 100.0);
    }
}
