//! Physics settings
//!
//! Tunable values for a `World`. Anything not listed here is a physical
//! constant in `crate::consts`.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Result, SimError};

/// Physics tuning for one world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Seed for the world-owned RNG (ship relocation, fragmentation)
    pub seed: u64,

    // === Ships ===
    /// Thruster force applied while a ship's thruster is active
    pub thruster_force: f64,
    /// Muzzle speed of fired bullets
    pub bullet_speed: f64,

    // === Minor planets ===
    /// Radius lost per unit of distance a planetoid travels
    pub planetoid_shrink_rate: f64,
    /// Planetoids at least this large fragment on death
    pub fragment_min_radius: f64,
    /// Fragment speed as a multiple of the parent's speed
    pub fragment_speed_factor: f64,

    // === Stepping ===
    /// Contacts one step may resolve before it stops and reports truncation
    pub max_events_per_step: usize,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            seed: 0,

            thruster_force: THRUSTER_FORCE,
            bullet_speed: BULLET_SPEED,

            planetoid_shrink_rate: PLANETOID_SHRINK_RATE,
            fragment_min_radius: FRAGMENT_MIN_RADIUS,
            fragment_speed_factor: FRAGMENT_SPEED_FACTOR,

            max_events_per_step: MAX_EVENTS_PER_STEP,
        }
    }
}

impl PhysicsSettings {
    /// Settings with the default tuning and a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse settings from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| SimError::argument(format!("bad settings JSON: {e}")))?;
        settings.validate()?;
        log::info!("Loaded physics settings (seed {})", settings.seed);
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        // Plain struct of numbers, serialization cannot fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject values that would break the stepping invariants
    pub fn validate(&self) -> Result<()> {
        let finite_non_negative = [
            ("thruster_force", self.thruster_force),
            ("bullet_speed", self.bullet_speed),
            ("planetoid_shrink_rate", self.planetoid_shrink_rate),
            ("fragment_min_radius", self.fragment_min_radius),
            ("fragment_speed_factor", self.fragment_speed_factor),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::argument(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.max_events_per_step == 0 {
            return Err(SimError::argument("max_events_per_step must be at least 1"));
        }
        Ok(())
    }
}
