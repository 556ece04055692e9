//! Simulation configuration.
//!
//! [`SimConfig`] holds every externally sourced knob of a run. It serializes
//! to JSON so a runner can load it from disk; missing fields take their
//! defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::patterns::Pattern;
use crate::physics::{
    BASE_DT, COLLISION_RADIUS, DEFAULT_GRAVITY_SLIDER, GRAVITY_PER_SLIDER_STEP, MAX_GRAVITY_SLIDER,
    MAX_SPEED_MULTIPLIER,
};
use crate::store::DEFAULT_CAPACITY;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_requested_count() -> usize {
    50
}

fn default_gravity() -> f32 {
    gravity_from_slider(DEFAULT_GRAVITY_SLIDER)
}

fn default_speed() -> f32 {
    1.0
}

fn default_collision_radius() -> f32 {
    COLLISION_RADIUS
}

/// Gravitational constant for a slider position in `0..=100`.
pub fn gravity_from_slider(slider: u32) -> f32 {
    slider.min(MAX_GRAVITY_SLIDER) as f32 * GRAVITY_PER_SLIDER_STEP
}

/// Complete simulation configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Number of slots, fixed for the lifetime of a simulation.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Bodies generated on restart.
    #[serde(default = "default_requested_count")]
    pub requested_count: usize,
    #[serde(default)]
    pub pattern: Pattern,
    /// Gravitational constant `G`.
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Time step multiplier (1.0 = normal, 0.5 = half speed, 4.0 = max)
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Respawn destroyed bodies and resolve collisions.
    #[serde(default)]
    pub evolve_mode: bool,
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f32,
    /// RNG seed. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            requested_count: default_requested_count(),
            pattern: Pattern::default(),
            gravity: default_gravity(),
            speed: default_speed(),
            evolve_mode: false,
            collision_radius: default_collision_radius(),
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_requested_count(mut self, count: usize) -> Self {
        self.requested_count = count;
        self
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set gravity from a slider position (`G = slider * 1e-7`).
    pub fn with_gravity_slider(mut self, slider: u32) -> Self {
        self.gravity = gravity_from_slider(slider);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_evolve_mode(mut self, evolve: bool) -> Self {
        self.evolve_mode = evolve;
        self
    }

    pub fn with_collision_radius(mut self, radius: f32) -> Self {
        self.collision_radius = radius;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Integration time step for the current speed multiplier.
    #[inline]
    pub fn dt(&self) -> f32 {
        BASE_DT * self.speed
    }

    /// Copy with every field forced into its valid range.
    ///
    /// Capacity is at least 1, the requested count at most the capacity, and
    /// the speed multiplier within `[0, 4]`.
    pub fn sanitized(&self) -> Self {
        let capacity = self.capacity.max(1);
        Self {
            capacity,
            requested_count: self.requested_count.min(capacity),
            speed: clamp_speed_multiplier(self.speed),
            gravity: if self.gravity.is_finite() { self.gravity } else { default_gravity() },
            ..self.clone()
        }
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

/// Clamp a speed multiplier into `[0, 4]`. NaN maps to 0.
pub fn clamp_speed_multiplier(speed: f32) -> f32 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, MAX_SPEED_MULTIPLIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.requested_count, 50);
        assert_eq!(config.pattern, Pattern::Random);
        assert!((config.gravity - 3.0e-6).abs() < 1e-12);
        assert_eq!(config.dt(), 1.0);
        assert!(!config.evolve_mode);
        assert_eq!(config.collision_radius, 0.01);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: SimConfig = serde_json::from_str(r#"{ "pattern": "galaxy", "evolve_mode": true }"#).unwrap();
        assert_eq!(config.pattern, Pattern::Galaxy);
        assert!(config.evolve_mode);
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_gravity_slider_mapping() {
        assert_eq!(gravity_from_slider(0), 0.0);
        assert!((gravity_from_slider(100) - 1.0e-5).abs() < 1e-12);
        assert_eq!(gravity_from_slider(250), gravity_from_slider(100));
        let config = SimConfig::default().with_gravity_slider(10);
        assert!((config.gravity - 1.0e-6).abs() < 1e-12);
    }

    #[test]
    fn test_sanitized_clamps() {
        let config = SimConfig::default()
            .with_capacity(0)
            .with_requested_count(10)
            .with_speed(9.0)
            .sanitized();
        assert_eq!(config.capacity, 1);
        assert_eq!(config.requested_count, 1);
        assert_eq!(config.speed, 4.0);

        assert_eq!(clamp_speed_multiplier(-1.0), 0.0);
        assert_eq!(clamp_speed_multiplier(f32::NAN), 0.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("nbody-sim-config-{}.json", std::process::id()));
        let config = SimConfig::default()
            .with_pattern(Pattern::Grid)
            .with_requested_count(100)
            .with_seed(42);
        config.save(&path).unwrap();
        let loaded = SimConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_errors() {
        let missing = SimConfig::load("/nonexistent/nbody-sim.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let path = std::env::temp_dir().join(format!("nbody-sim-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let bad = SimConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(bad, Err(ConfigError::Parse(_))));
    }
}
