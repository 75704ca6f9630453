//! Agent records and the registry that owns them.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::{AgentId, AiError, AiResult, TeamId, ValidationError, Vec3};

use crate::behavior::BehaviorState;
use crate::difficulty::DifficultyProfile;
use crate::suspension::Suspension;

/// One-tick signal raised by a behavior that reached its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorSignal {
    /// Move destination reached
    Arrived,
    /// Landing zone reached
    Landed,
}

/// Per-agent target resolution cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetingState {
    /// Last natural (non-forced) pick
    pub(crate) natural: Option<AgentId>,
    /// Simulated time at which natural resolution may run again
    pub(crate) next_natural_at: f64,
    /// Target resolved on the last tick
    pub(crate) current: Option<AgentId>,
}

impl TargetingState {
    /// Target resolved on the last tick.
    #[must_use]
    pub const fn current(&self) -> Option<AgentId> {
        self.current
    }

    /// Last natural pick, which may differ from `current` under a forced target.
    #[must_use]
    pub const fn natural(&self) -> Option<AgentId> {
        self.natural
    }

    /// Makes natural resolution eligible on the next tick.
    pub(crate) fn expire(&mut self) {
        self.next_natural_at = f64::NEG_INFINITY;
    }
}

/// An AI-controlled combatant.
///
/// The world owns the agent's position; the record only keeps the spawn
/// point for reference.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    team: TeamId,
    alive: bool,
    spawn_point: Vec3,
    pub(crate) state: BehaviorState,
    pub(crate) forced_target: Option<AgentId>,
    pub(crate) focus_point: Option<Vec3>,
    pub(crate) profile: DifficultyProfile,
    pub(crate) pending_profile: Option<DifficultyProfile>,
    pub(crate) shooting_enabled: bool,
    pub(crate) targeting_enabled: bool,
    pub(crate) forced_fire: bool,
    pub(crate) suspension: Option<Suspension>,
    pub(crate) targeting: TargetingState,
    pub(crate) signal: Option<BehaviorSignal>,
}

impl Agent {
    /// Creates a live, idle agent.
    #[must_use]
    pub fn new(id: AgentId, team: TeamId, spawn_point: Vec3) -> Self {
        Self {
            id,
            team,
            alive: true,
            spawn_point,
            state: BehaviorState::Idle,
            forced_target: None,
            focus_point: None,
            profile: DifficultyProfile::default(),
            pending_profile: None,
            shooting_enabled: true,
            targeting_enabled: true,
            forced_fire: false,
            suspension: None,
            targeting: TargetingState::default(),
            signal: None,
        }
    }

    /// Agent id.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Team.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Whether the agent is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Where the agent spawned.
    #[must_use]
    pub const fn spawn_point(&self) -> Vec3 {
        self.spawn_point
    }

    /// Active behavior state.
    #[must_use]
    pub const fn state(&self) -> &BehaviorState {
        &self.state
    }

    /// Forced target, if set.
    #[must_use]
    pub const fn forced_target(&self) -> Option<AgentId> {
        self.forced_target
    }

    /// Focus point, if set.
    #[must_use]
    pub const fn focus_point(&self) -> Option<Vec3> {
        self.focus_point
    }

    /// Difficulty profile in effect.
    #[must_use]
    pub const fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    /// Whether engagement intents may be emitted.
    #[must_use]
    pub const fn shooting_enabled(&self) -> bool {
        self.shooting_enabled
    }

    /// Whether natural target resolution runs.
    #[must_use]
    pub const fn targeting_enabled(&self) -> bool {
        self.targeting_enabled
    }

    /// Whether forced fire is active.
    #[must_use]
    pub const fn is_forced_firing(&self) -> bool {
        self.forced_fire
    }

    /// Pending suspension, if any.
    #[must_use]
    pub const fn suspension(&self) -> Option<&Suspension> {
        self.suspension.as_ref()
    }

    /// Targeting cache.
    #[must_use]
    pub const fn targeting(&self) -> &TargetingState {
        &self.targeting
    }

    /// Signal raised on the last tick.
    #[must_use]
    pub const fn signal(&self) -> Option<BehaviorSignal> {
        self.signal
    }

    /// Marks the agent dead and drops everything that could still act.
    pub(crate) fn kill(&mut self) {
        self.alive = false;
        self.forced_fire = false;
        self.suspension = None;
        self.signal = None;
        self.targeting.current = None;
        self.targeting.natural = None;
    }
}

/// Owner of every agent record, in creation order.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: AHashMap<AgentId, Agent>,
    order: Vec<AgentId>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly spawned agent.
    pub fn register(&mut self, id: AgentId, team: TeamId, spawn_point: Vec3) -> Result<(), ValidationError> {
        if self.agents.contains_key(&id) {
            return Err(ValidationError::DuplicateAgent(id));
        }
        self.agents.insert(id, Agent::new(id, team, spawn_point));
        self.order.push(id);
        Ok(())
    }

    /// Marks an agent dead. Returns `false` if it was unknown or already dead.
    pub fn mark_dead(&mut self, id: AgentId) -> bool {
        match self.agents.get_mut(&id) {
            Some(agent) if agent.is_alive() => {
                agent.kill();
                true
            },
            _ => false,
        }
    }

    /// Removes an agent.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let agent = self.agents.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(agent)
    }

    /// Gets an agent.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Gets a mutable agent.
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Gets a live agent or reports `InvalidAgent`.
    pub fn alive_mut(&mut self, id: AgentId) -> AiResult<&mut Agent> {
        match self.agents.get_mut(&id) {
            Some(agent) if agent.is_alive() => Ok(agent),
            _ => Err(AiError::InvalidAgent(id)),
        }
    }

    /// Whether the agent exists (alive or dead).
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Whether the agent exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: AgentId) -> bool {
        self.agents.get(&id).is_some_and(Agent::is_alive)
    }

    /// Agent ids in creation order.
    #[must_use]
    pub fn order(&self) -> &[AgentId] {
        &self.order
    }

    /// Agents in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Mutable access to every agent, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.values_mut()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of live agents.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_alive()).count()
    }

    /// Number of live agents on a team.
    #[must_use]
    pub fn team_alive_count(&self, team: TeamId) -> usize {
        self.agents
            .values()
            .filter(|a| a.is_alive() && a.team() == team)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_defaults() {
        let agent = Agent::new(AgentId::new(1), TeamId::new(1), Vec3::ZERO);
        assert!(agent.is_alive());
        assert_eq!(agent.state(), &BehaviorState::Idle);
        assert!(agent.shooting_enabled());
        assert!(agent.targeting_enabled());
        assert!(agent.forced_target().is_none());
        assert!(agent.suspension().is_none());
    }

    #[test]
    fn test_register_keeps_creation_order() {
        let mut registry = AgentRegistry::new();
        for raw in [5, 2, 9] {
            registry
                .register(AgentId::new(raw), TeamId::new(1), Vec3::ZERO)
                .expect("register");
        }
        let order: Vec<u32> = registry.iter().map(|a| a.id().raw()).collect();
        assert_eq!(order, vec![5, 2, 9]);
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = AgentRegistry::new();
        let id = AgentId::new(1);
        registry.register(id, TeamId::new(1), Vec3::ZERO).expect("register");
        let result = registry.register(id, TeamId::new(2), Vec3::ONE);
        assert_eq!(result, Err(ValidationError::DuplicateAgent(id)));
    }

    #[test]
    fn test_mark_dead_and_counts() {
        let mut registry = AgentRegistry::new();
        let blue = TeamId::new(1);
        registry.register(AgentId::new(1), blue, Vec3::ZERO).expect("register");
        registry.register(AgentId::new(2), blue, Vec3::ZERO).expect("register");
        registry.register(AgentId::new(3), TeamId::new(2), Vec3::ZERO).expect("register");

        assert!(registry.mark_dead(AgentId::new(2)));
        assert!(!registry.mark_dead(AgentId::new(2)));
        assert_eq!(registry.alive_count(), 2);
        assert_eq!(registry.team_alive_count(blue), 1);
        assert!(matches!(
            registry.alive_mut(AgentId::new(2)),
            Err(AiError::InvalidAgent(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut registry = AgentRegistry::new();
        let id = AgentId::new(4);
        registry.register(id, TeamId::new(1), Vec3::ZERO).expect("register");
        assert!(registry.remove(id).is_some());
        assert!(registry.order().is_empty());
        assert!(!registry.contains(id));
    }
}
