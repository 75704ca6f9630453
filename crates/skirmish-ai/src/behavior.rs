//! Behavior states an agent can be in.
//!
//! Each variant carries only the fields its behavior needs, so switching
//! state cannot leave stale data from the previous one behind.

use serde::{Deserialize, Serialize};
use skirmish_common::{is_finite_position, AgentId, ValidationError, Vec3};

/// Ordered, non-empty sequence of patrol positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WaypointPathDef", into = "WaypointPathDef")]
pub struct WaypointPath {
    points: Vec<Vec3>,
    looped: bool,
}

/// Serialized form of [`WaypointPath`], validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WaypointPathDef {
    points: Vec<Vec3>,
    #[serde(default)]
    looped: bool,
}

impl TryFrom<WaypointPathDef> for WaypointPath {
    type Error = ValidationError;

    fn try_from(def: WaypointPathDef) -> Result<Self, Self::Error> {
        Self::new(def.points, def.looped)
    }
}

impl From<WaypointPath> for WaypointPathDef {
    fn from(path: WaypointPath) -> Self {
        Self {
            points: path.points,
            looped: path.looped,
        }
    }
}

impl WaypointPath {
    /// Creates a path, rejecting empty or non-finite point lists.
    pub fn new(points: Vec<Vec3>, looped: bool) -> Result<Self, ValidationError> {
        if points.is_empty() {
            return Err(ValidationError::EmptyWaypointPath);
        }
        if !points.iter().copied().all(is_finite_position) {
            return Err(ValidationError::NonFinitePosition("waypoint path"));
        }
        Ok(Self { points, looped })
    }

    /// Number of waypoints (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Waypoint at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    /// All waypoints in order.
    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Whether the patrol wraps around after the last waypoint.
    #[must_use]
    pub const fn looped(&self) -> bool {
        self.looped
    }
}

/// The single active top-level mode of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BehaviorState {
    /// Stand still
    Idle,
    /// Walk to a destination and signal arrival
    MoveToLocation {
        /// Destination
        dest: Vec3,
    },
    /// Hold a ring around a point and engage threats near it
    DefendLocation {
        /// Center of the defended area
        center: Vec3,
        /// Inner radius the agent stays outside of
        min_radius: f32,
        /// Outer radius the agent stays inside of
        max_radius: f32,
    },
    /// Escort another agent
    DefendPlayer {
        /// Agent being protected
        target: AgentId,
    },
    /// Walk a waypoint path
    WaypointPatrol {
        /// Path to walk
        path: WaypointPath,
        /// Index of the next waypoint
        index: usize,
    },
    /// Descend onto a landing zone
    Parachute {
        /// Where to land
        landing_zone: Vec3,
    },
    /// Autonomous combat
    BattlefieldAI,
}

impl Default for BehaviorState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Field-less discriminant of [`BehaviorState`], used in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// See [`BehaviorState::Idle`]
    Idle,
    /// See [`BehaviorState::MoveToLocation`]
    MoveToLocation,
    /// See [`BehaviorState::DefendLocation`]
    DefendLocation,
    /// See [`BehaviorState::DefendPlayer`]
    DefendPlayer,
    /// See [`BehaviorState::WaypointPatrol`]
    WaypointPatrol,
    /// See [`BehaviorState::Parachute`]
    Parachute,
    /// See [`BehaviorState::BattlefieldAI`]
    BattlefieldAI,
}

impl BehaviorState {
    /// Starts a patrol at the first waypoint.
    #[must_use]
    pub fn patrol(path: WaypointPath) -> Self {
        Self::WaypointPatrol { path, index: 0 }
    }

    /// Defend a ring around `center`.
    #[must_use]
    pub fn defend(center: Vec3, min_radius: f32, max_radius: f32) -> Self {
        Self::DefendLocation {
            center,
            min_radius,
            max_radius,
        }
    }

    /// Returns the discriminant of this state.
    #[must_use]
    pub const fn kind(&self) -> BehaviorKind {
        match self {
            Self::Idle => BehaviorKind::Idle,
            Self::MoveToLocation { .. } => BehaviorKind::MoveToLocation,
            Self::DefendLocation { .. } => BehaviorKind::DefendLocation,
            Self::DefendPlayer { .. } => BehaviorKind::DefendPlayer,
            Self::WaypointPatrol { .. } => BehaviorKind::WaypointPatrol,
            Self::Parachute { .. } => BehaviorKind::Parachute,
            Self::BattlefieldAI => BehaviorKind::BattlefieldAI,
        }
    }

    /// Whether this state looks for targets on its own.
    #[must_use]
    pub const fn seeks_targets(&self) -> bool {
        matches!(
            self,
            Self::DefendLocation { .. } | Self::DefendPlayer { .. } | Self::BattlefieldAI
        )
    }

    /// Whether squad follow movement may drive an agent in this state.
    #[must_use]
    pub const fn accepts_formation(&self) -> bool {
        matches!(self, Self::Idle | Self::BattlefieldAI)
    }

    /// Checks the state's own fields for malformed values.
    ///
    /// Agent references are checked by the caller, which owns the registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            // Paths are checked when built.
            Self::Idle | Self::BattlefieldAI | Self::DefendPlayer { .. } | Self::WaypointPatrol { .. } => Ok(()),
            Self::MoveToLocation { dest } => {
                if is_finite_position(*dest) {
                    Ok(())
                } else {
                    Err(ValidationError::NonFinitePosition("move destination"))
                }
            },
            Self::Parachute { landing_zone } => {
                if is_finite_position(*landing_zone) {
                    Ok(())
                } else {
                    Err(ValidationError::NonFinitePosition("landing zone"))
                }
            },
            Self::DefendLocation {
                center,
                min_radius,
                max_radius,
            } => {
                if !is_finite_position(*center) {
                    return Err(ValidationError::NonFinitePosition("defend center"));
                }
                for radius in [*min_radius, *max_radius] {
                    if !radius.is_finite() || radius < 0.0 {
                        return Err(ValidationError::InvalidRadius(radius));
                    }
                }
                if min_radius > max_radius {
                    return Err(ValidationError::InvertedRadii {
                        min: *min_radius,
                        max: *max_radius,
                    });
                }
                Ok(())
            },
        }
    }
}
