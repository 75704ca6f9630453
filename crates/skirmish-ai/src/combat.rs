//! Engagement intents handed to the external combat-resolution service.
//!
//! The AI core decides *who shoots at what*; hit and damage resolution
//! belong to the service on the other side of [`CombatService`].

use serde::{Deserialize, Serialize};
use skirmish_common::{AgentId, Vec3};
use std::collections::VecDeque;

use crate::difficulty::DifficultyProfile;

/// What an engagement is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EngagementTarget {
    /// Another agent
    Agent(AgentId),
    /// A point in the world (forced fire without a target)
    Point(Vec3),
    /// Straight ahead, no target or focus point known
    Forward,
}

/// An intent to engage, forwarded once per tick per engaging agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementIntent {
    /// Agent engaging
    pub attacker: AgentId,
    /// What it engages
    pub target: EngagementTarget,
    /// Attacker's difficulty profile at the time of the intent
    pub profile: DifficultyProfile,
    /// Whether the intent comes from forced fire
    pub forced: bool,
    /// Aim point override set by the focus point, if any
    pub aim: Option<Vec3>,
}

impl EngagementIntent {
    /// Creates a new engagement intent.
    #[must_use]
    pub fn new(attacker: AgentId, target: EngagementTarget, profile: DifficultyProfile) -> Self {
        Self {
            attacker,
            target,
            profile,
            forced: false,
            aim: None,
        }
    }

    /// Marks the intent as forced fire.
    #[must_use]
    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    /// Sets the aim point.
    #[must_use]
    pub fn with_aim(mut self, aim: Option<Vec3>) -> Self {
        self.aim = aim;
        self
    }
}

/// Combat-resolution service. Calls are fire-and-forget.
pub trait CombatService {
    /// Receives one engagement intent.
    fn submit(&mut self, intent: EngagementIntent);
}

/// Queue of intents, for hosts that resolve combat in a later phase.
#[derive(Debug, Default)]
pub struct IntentQueue {
    intents: VecDeque<EngagementIntent>,
}

impl IntentQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Removes and returns all queued intents in submission order.
    pub fn drain(&mut self) -> Vec<EngagementIntent> {
        self.intents.drain(..).collect()
    }

    /// Iterates queued intents without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &EngagementIntent> {
        self.intents.iter()
    }
}

impl CombatService for IntentQueue {
    fn submit(&mut self, intent: EngagementIntent) {
        self.intents.push_back(intent);
    }
}
