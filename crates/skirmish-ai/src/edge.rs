//! Typed edge detection keyed by agent and named condition.
//!
//! A behavior reports a level every tick ("am I at my destination?"); the
//! detector turns that into a one-shot `just_triggered` on the rising edge,
//! so one-time notifications fire once per arrival instead of every tick.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::AgentId;

/// Conditions tracked per agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedCondition {
    /// Reached a move destination
    Arrived,
    /// Touched down at a landing zone
    Landed,
    /// Inside a defended ring
    HoldingPosition,
}

/// Result of feeding a level into a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeTrigger {
    /// `true` only on the tick the condition went from false to true
    pub just_triggered: bool,
}

/// Rising-edge detector over a boolean level.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    /// Feeds the current level.
    pub fn update(&mut self, level: bool) -> EdgeTrigger {
        let just_triggered = level && !self.last;
        self.last = level;
        EdgeTrigger { just_triggered }
    }

    /// Last level seen.
    #[must_use]
    pub const fn level(&self) -> bool {
        self.last
    }
}

/// All edge detectors, keyed by `(agent, condition)`.
#[derive(Debug, Default)]
pub struct EdgeDetectors {
    detectors: AHashMap<(AgentId, NamedCondition), EdgeDetector>,
}

impl EdgeDetectors {
    /// Creates an empty set of detectors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a level for one agent's condition.
    pub fn update(&mut self, agent: AgentId, condition: NamedCondition, level: bool) -> EdgeTrigger {
        self.detectors
            .entry((agent, condition))
            .or_default()
            .update(level)
    }

    /// Last level seen for one agent's condition.
    #[must_use]
    pub fn level(&self, agent: AgentId, condition: NamedCondition) -> bool {
        self.detectors
            .get(&(agent, condition))
            .is_some_and(EdgeDetector::level)
    }

    /// Forgets every detector of an agent.
    pub fn reset_agent(&mut self, agent: AgentId) {
        self.detectors.retain(|(id, _), _| *id != agent);
    }

    /// Number of live detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Whether no detector is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
