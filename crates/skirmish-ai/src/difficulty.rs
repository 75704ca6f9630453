//! Difficulty profiles consumed by behaviors and the combat service.

use serde::{Deserialize, Serialize};

/// Movement pace of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveSpeedClass {
    /// Slow, cautious walk
    Walk,
    /// Patrol pace
    Patrol,
    /// Combat run (base speed)
    Run,
    /// Full sprint
    Sprint,
}

impl MoveSpeedClass {
    /// Multiplier applied to the configured base move speed.
    #[must_use]
    pub const fn multiplier(self) -> f32 {
        match self {
            Self::Walk => 0.4,
            Self::Patrol => 0.6,
            Self::Run => 1.0,
            Self::Sprint => 1.5,
        }
    }
}

impl Default for MoveSpeedClass {
    fn default() -> Self {
        Self::Run
    }
}

/// Named difficulty presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifficultyTier {
    /// Forgiving opponents
    Recruit,
    /// Baseline
    Regular,
    /// Hits harder, takes less
    Veteran,
    /// Hardest preset
    Elite,
}

/// Parameter bundle for one agent.
///
/// `accuracy_hint` is opaque to the AI core; it is forwarded to the combat
/// resolution service with every engagement intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Multiplier on damage this agent deals
    pub damage_out_multiplier: f32,
    /// Multiplier on damage this agent receives
    pub damage_in_multiplier: f32,
    /// Movement pace
    pub move_speed: MoveSpeedClass,
    /// Opaque accuracy value for the combat service
    pub accuracy_hint: f32,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::preset(DifficultyTier::Regular)
    }
}

impl DifficultyProfile {
    /// Returns the profile for a named preset.
    #[must_use]
    pub const fn preset(tier: DifficultyTier) -> Self {
        match tier {
            DifficultyTier::Recruit => Self {
                damage_out_multiplier: 0.6,
                damage_in_multiplier: 1.25,
                move_speed: MoveSpeedClass::Run,
                accuracy_hint: 0.3,
            },
            DifficultyTier::Regular => Self {
                damage_out_multiplier: 1.0,
                damage_in_multiplier: 1.0,
                move_speed: MoveSpeedClass::Run,
                accuracy_hint: 0.5,
            },
            DifficultyTier::Veteran => Self {
                damage_out_multiplier: 1.25,
                damage_in_multiplier: 0.8,
                move_speed: MoveSpeedClass::Run,
                accuracy_hint: 0.7,
            },
            DifficultyTier::Elite => Self {
                damage_out_multiplier: 1.5,
                damage_in_multiplier: 0.6,
                move_speed: MoveSpeedClass::Sprint,
                accuracy_hint: 0.9,
            },
        }
    }

    /// Sets the move speed class.
    #[must_use]
    pub const fn with_move_speed(mut self, move_speed: MoveSpeedClass) -> Self {
        self.move_speed = move_speed;
        self
    }

    /// Movement speed in units per second for a given base speed.
    #[must_use]
    pub fn move_speed_units(&self, base_speed: f32) -> f32 {
        base_speed * self.move_speed.multiplier()
    }
}
