//! World interface consumed by the AI core.
//!
//! The world owns positions, health and line of sight. Every query is
//! fallible per call: `None` means the data is momentarily unavailable, which
//! the core treats as graceful degradation rather than an error.

use ahash::{AHashMap, AHashSet};
use skirmish_common::{AgentId, Vec3};

/// Read-only world queries.
///
/// `Sync` because the visibility snapshot is computed across threads.
pub trait WorldQuery: Sync {
    /// Current position of an agent.
    fn position(&self, agent: AgentId) -> Option<Vec3>;

    /// Current health of an agent (any non-negative scale).
    fn health(&self, agent: AgentId) -> Option<f32>;

    /// Whether `from` can see `to`.
    fn line_of_sight(&self, from: AgentId, to: AgentId) -> Option<bool>;

    /// Distance between two agents.
    fn distance(&self, a: AgentId, b: AgentId) -> Option<f32> {
        Some(self.position(a)?.distance(self.position(b)?))
    }
}

/// World access needed to apply steering output.
pub trait WorldMut: WorldQuery {
    /// Moves an agent to a new position.
    fn set_position(&mut self, agent: AgentId, pos: Vec3);
}

/// In-memory world used by tests and the headless host.
#[derive(Debug, Default, Clone)]
pub struct SandboxWorld {
    positions: AHashMap<AgentId, Vec3>,
    health: AHashMap<AgentId, f32>,
    /// Ordered pairs (from, to) whose line of sight is blocked
    blocked: AHashSet<(AgentId, AgentId)>,
    /// Agents whose data reads fail
    unavailable: AHashSet<AgentId>,
}

impl SandboxWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an agent with the given health.
    pub fn place(&mut self, agent: AgentId, pos: Vec3, health: f32) {
        self.positions.insert(agent, pos);
        self.health.insert(agent, health);
    }

    /// Removes an agent from the world.
    pub fn remove(&mut self, agent: AgentId) {
        self.positions.remove(&agent);
        self.health.remove(&agent);
        self.unavailable.remove(&agent);
        self.blocked.retain(|(a, b)| *a != agent && *b != agent);
    }

    /// Sets an agent's health.
    pub fn set_health(&mut self, agent: AgentId, health: f32) {
        self.health.insert(agent, health);
    }

    /// Blocks line of sight in both directions between two agents.
    pub fn block_sight(&mut self, a: AgentId, b: AgentId) {
        self.blocked.insert((a, b));
        self.blocked.insert((b, a));
    }

    /// Restores line of sight in both directions between two agents.
    pub fn clear_sight(&mut self, a: AgentId, b: AgentId) {
        self.blocked.remove(&(a, b));
        self.blocked.remove(&(b, a));
    }

    /// Makes every query about `agent` fail until restored.
    pub fn set_unavailable(&mut self, agent: AgentId, unavailable: bool) {
        if unavailable {
            self.unavailable.insert(agent);
        } else {
            self.unavailable.remove(&agent);
        }
    }
}

impl WorldQuery for SandboxWorld {
    fn position(&self, agent: AgentId) -> Option<Vec3> {
        if self.unavailable.contains(&agent) {
            return None;
        }
        self.positions.get(&agent).copied()
    }

    fn health(&self, agent: AgentId) -> Option<f32> {
        if self.unavailable.contains(&agent) {
            return None;
        }
        self.health.get(&agent).copied()
    }

    fn line_of_sight(&self, from: AgentId, to: AgentId) -> Option<bool> {
        if self.unavailable.contains(&from) || self.unavailable.contains(&to) {
            return None;
        }
        Some(!self.blocked.contains(&(from, to)))
    }
}

impl WorldMut for SandboxWorld {
    fn set_position(&mut self, agent: AgentId, pos: Vec3) {
        self.positions.insert(agent, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_queries() {
        let mut world = SandboxWorld::new();
        let a = AgentId::new(1);
        let b = AgentId::new(2);
        world.place(a, Vec3::ZERO, 100.0);
        world.place(b, Vec3::new(3.0, 0.0, 4.0), 50.0);

        assert_eq!(world.distance(a, b), Some(5.0));
        assert_eq!(world.health(b), Some(50.0));
        assert_eq!(world.line_of_sight(a, b), Some(true));
    }

    #[test]
    fn test_sandbox_blocked_sight() {
        let mut world = SandboxWorld::new();
        let a = AgentId::new(1);
        let b = AgentId::new(2);
        world.place(a, Vec3::ZERO, 100.0);
        world.place(b, Vec3::X, 100.0);

        world.block_sight(a, b);
        assert_eq!(world.line_of_sight(b, a), Some(false));

        world.clear_sight(a, b);
        assert_eq!(world.line_of_sight(a, b), Some(true));
    }

    #[test]
    fn test_sandbox_unavailable() {
        let mut world = SandboxWorld::new();
        let a = AgentId::new(1);
        world.place(a, Vec3::ZERO, 100.0);

        world.set_unavailable(a, true);
        assert!(world.position(a).is_none());
        assert!(world.health(a).is_none());

        world.set_unavailable(a, false);
        assert_eq!(world.position(a), Some(Vec3::ZERO));
    }
}
