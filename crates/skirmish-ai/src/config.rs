//! AI core configuration.
//!
//! Policy constants for targeting cadence, tie-breaks, movement and squad
//! spacing. Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Rule used to order natural target candidates at equal distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lowest current health first, then lowest id
    LowestHealthThenId,
    /// Lowest id only
    LowestId,
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::LowestHealthThenId
    }
}

/// AI core configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    // === Targeting ===
    /// Simulated seconds between natural target re-resolutions
    pub retarget_interval: f64,
    /// Ordering of equally distant candidates
    pub tie_break: TieBreak,
    /// Maximum distance at which a candidate counts as visible
    pub sight_range: f32,

    // === Movement ===
    /// Distance under which a destination counts as reached
    pub arrival_epsilon: f32,
    /// Speed in units per second for `MoveSpeedClass::Run`
    pub base_move_speed: f32,
    /// Vertical descent speed while parachuting
    pub parachute_descent_rate: f32,

    // === Defend / escort ===
    /// How far outside a defended ring threats are still engaged
    pub defend_threat_margin: f32,
    /// Distance an escort keeps from the protected agent
    pub escort_radius: f32,

    // === Squads ===
    /// Radius of the circular formation around the leader
    pub formation_radius: f32,

    // === Notifications ===
    /// Capacity of the event bus before events are dropped
    pub event_capacity: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            // Targeting
            retarget_interval: 0.5,
            tie_break: TieBreak::LowestHealthThenId,
            sight_range: 150.0,

            // Movement
            arrival_epsilon: 1.0,
            base_move_speed: 5.0,
            parachute_descent_rate: 6.0,

            // Defend / escort
            defend_threat_margin: 10.0,
            escort_radius: 6.0,

            // Squads
            formation_radius: 4.0,

            // Notifications
            event_capacity: 4096,
        }
    }
}

impl AiConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("AI config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read AI config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        config.validate();
                        info!("Loaded AI config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse AI config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open AI config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved AI config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        if !self.retarget_interval.is_finite() {
            self.retarget_interval = 0.5;
        }
        self.retarget_interval = self.retarget_interval.clamp(0.0, 10.0);
        self.sight_range = self.sight_range.clamp(1.0, 10_000.0);

        self.arrival_epsilon = self.arrival_epsilon.clamp(0.01, 10.0);
        self.base_move_speed = self.base_move_speed.clamp(0.1, 100.0);
        self.parachute_descent_rate = self.parachute_descent_rate.clamp(0.1, 100.0);

        self.defend_threat_margin = self.defend_threat_margin.clamp(0.0, 1000.0);
        self.escort_radius = self.escort_radius.clamp(0.5, 100.0);
        self.formation_radius = self.formation_radius.clamp(0.0, 100.0);

        self.event_capacity = self.event_capacity.clamp(16, 1 << 20);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AiConfig::default();
        assert_eq!(config.retarget_interval, 0.5);
        assert_eq!(config.tie_break, TieBreak::LowestHealthThenId);
        assert_eq!(config.arrival_epsilon, 1.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AiConfig::default();
        config.retarget_interval = f64::NAN;
        config.arrival_epsilon = 0.0;
        config.event_capacity = 1;

        config.validate();

        assert_eq!(config.retarget_interval, 0.5);
        assert!((config.arrival_epsilon - 0.01).abs() < 1e-6);
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("ai.toml");

        let mut config = AiConfig::default();
        config.retarget_interval = 1.25;
        config.tie_break = TieBreak::LowestId;
        config.formation_radius = 7.0;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = AiConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = AiConfig::load_from("/nonexistent/path/ai.toml");
        assert_eq!(config, AiConfig::default());
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("ai.toml");
        fs::write(&config_path, "tie_break = \"lowest_id\"\n").expect("write");

        let loaded = AiConfig::load_from(&config_path);
        assert_eq!(loaded.tie_break, TieBreak::LowestId);
        assert_eq!(loaded.sight_range, 150.0);
    }

    #[test]
    fn test_config_invalid_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("ai.toml");
        fs::write(&config_path, "retarget_interval = \"soon\"\n").expect("write");

        assert_eq!(AiConfig::load_from(&config_path), AiConfig::default());
    }
}
