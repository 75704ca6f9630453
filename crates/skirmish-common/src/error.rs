//! Error types for the Skirmish AI core.

use crate::ids::{AgentId, SquadId};
use thiserror::Error;

/// Top-level error type for AI command operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AiError {
    /// Malformed input, rejected before any mutation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The command targets a dead, despawned or unknown agent
    #[error("invalid agent: {0}")]
    InvalidAgent(AgentId),

    /// A world query failed for an agent this tick
    #[error("world data unavailable for {agent}: {what}")]
    ResourceUnavailable {
        /// Agent whose data could not be read
        agent: AgentId,
        /// Which query failed
        what: &'static str,
    },
}

/// Malformed command input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Waypoint path with no points
    #[error("waypoint path must contain at least one point")]
    EmptyWaypointPath,

    /// Defend radii out of order
    #[error("min radius {min} exceeds max radius {max}")]
    InvertedRadii {
        /// Minimum radius
        min: f32,
        /// Maximum radius
        max: f32,
    },

    /// Negative or non-finite radius
    #[error("invalid radius: {0}")]
    InvalidRadius(f32),

    /// Position with NaN or infinite components
    #[error("non-finite position in {0}")]
    NonFinitePosition(&'static str),

    /// Reference to an agent the registry does not know
    #[error("unknown agent referenced: {0}")]
    UnknownAgent(AgentId),

    /// Agent asked to escort itself
    #[error("{0} cannot escort itself")]
    SelfEscort(AgentId),

    /// Duration that is zero, negative or non-finite
    #[error("invalid duration: {0}s")]
    InvalidDuration(f64),

    /// Agent already registered with this id
    #[error("agent already registered: {0}")]
    DuplicateAgent(AgentId),

    /// Squad leader also listed as a member
    #[error("leader {0} listed among squad members")]
    LeaderInMembers(AgentId),

    /// Same member listed twice
    #[error("member {0} listed more than once")]
    DuplicateMember(AgentId),

    /// Agent belongs to another squad already
    #[error("{agent} already belongs to {squad}")]
    AlreadyInSquad {
        /// Agent in question
        agent: AgentId,
        /// Squad it belongs to
        squad: SquadId,
    },

    /// Squad id not known to the coordinator
    #[error("unknown squad: {0}")]
    UnknownSquad(SquadId),
}

/// Result type alias for AI command operations.
pub type AiResult<T> = Result<T, AiError>;
