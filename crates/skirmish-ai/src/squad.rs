//! Leader/member squads: formation following, escorts and succession.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::{circle_offset, AgentId, AiError, AiResult, SquadId, ValidationError, Vec3};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::agent::AgentRegistry;
use crate::behavior::BehaviorState;
use crate::controller::BehaviorController;
use crate::events::{AiEvent, EventBus};
use crate::world::{WorldMut, WorldQuery};

/// How members relate to their leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SquadPolicy {
    /// Idle or battlefield members keep their formation slot around the leader
    #[default]
    Follow,
    /// Members defend the leader
    Escort,
}

/// A leader and its ordered members.
#[derive(Debug, Clone, PartialEq)]
pub struct Squad {
    id: SquadId,
    leader: AgentId,
    members: Vec<AgentId>,
    /// Formation slot per member, same order as `members`
    offsets: Vec<Vec3>,
    policy: SquadPolicy,
}

impl Squad {
    fn new(id: SquadId, leader: AgentId, members: Vec<AgentId>, policy: SquadPolicy, radius: f32) -> Self {
        let mut squad = Self {
            id,
            leader,
            members,
            offsets: Vec::new(),
            policy,
        };
        squad.respread(radius);
        squad
    }

    /// Squad id.
    #[must_use]
    pub const fn id(&self) -> SquadId {
        self.id
    }

    /// Current leader.
    #[must_use]
    pub const fn leader(&self) -> AgentId {
        self.leader
    }

    /// Members, excluding the leader.
    #[must_use]
    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    /// Policy in effect.
    #[must_use]
    pub const fn policy(&self) -> SquadPolicy {
        self.policy
    }

    /// Formation offset of a member relative to the leader.
    #[must_use]
    pub fn offset_of(&self, member: AgentId) -> Option<Vec3> {
        let index = self.members.iter().position(|m| *m == member)?;
        self.offsets.get(index).copied()
    }

    fn respread(&mut self, radius: f32) {
        let count = self.members.len();
        self.offsets = (0..count).map(|i| circle_offset(i, count, radius)).collect();
    }
}

/// Owns every squad and keeps them consistent with the agent registry.
#[derive(Debug)]
pub struct SquadCoordinator {
    /// Ordered by id so squads update in creation order
    squads: BTreeMap<SquadId, Squad>,
    /// Squad of every leader and member
    membership: AHashMap<AgentId, SquadId>,
    next_id: u32,
    formation_radius: f32,
}

impl SquadCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new(formation_radius: f32) -> Self {
        Self {
            squads: BTreeMap::new(),
            membership: AHashMap::new(),
            next_id: 1,
            formation_radius,
        }
    }

    /// Gets a squad.
    #[must_use]
    pub fn get(&self, id: SquadId) -> Option<&Squad> {
        self.squads.get(&id)
    }

    /// Squad an agent belongs to, as leader or member.
    #[must_use]
    pub fn squad_of(&self, agent: AgentId) -> Option<SquadId> {
        self.membership.get(&agent).copied()
    }

    /// Squads in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Squad> {
        self.squads.values()
    }

    /// Number of squads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.squads.len()
    }

    /// Whether there are no squads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.squads.is_empty()
    }

    fn validate(&self, leader: AgentId, members: &[AgentId], registry: &AgentRegistry) -> AiResult<()> {
        for agent in std::iter::once(&leader).chain(members) {
            if !registry.contains(*agent) {
                return Err(ValidationError::UnknownAgent(*agent).into());
            }
            if !registry.is_alive(*agent) {
                return Err(AiError::InvalidAgent(*agent));
            }
            if let Some(squad) = self.squad_of(*agent) {
                return Err(ValidationError::AlreadyInSquad { agent: *agent, squad }.into());
            }
        }
        if members.contains(&leader) {
            return Err(ValidationError::LeaderInMembers(leader).into());
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(ValidationError::DuplicateMember(*member).into());
            }
        }
        Ok(())
    }

    /// Forms a squad and applies its policy to the members.
    pub fn create(
        &mut self,
        leader: AgentId,
        members: &[AgentId],
        policy: SquadPolicy,
        registry: &mut AgentRegistry,
        controller: &mut BehaviorController,
        events: &EventBus,
    ) -> AiResult<SquadId> {
        self.validate(leader, members, registry)?;

        let id = SquadId::new(self.next_id);
        self.next_id += 1;

        self.membership.insert(leader, id);
        for member in members {
            self.membership.insert(*member, id);
        }
        self.squads.insert(
            id,
            Squad::new(id, leader, members.to_vec(), policy, self.formation_radius),
        );

        info!("Created {} led by {} with {} members", id, leader, members.len());
        events.publish(AiEvent::SquadCreated { squad: id, leader });

        self.apply_policy(id, registry, controller, events);
        Ok(id)
    }

    /// Dissolves a squad. Members keep their current behavior.
    pub fn disband(&mut self, id: SquadId, events: &EventBus) -> AiResult<Squad> {
        let squad = self
            .squads
            .remove(&id)
            .ok_or(ValidationError::UnknownSquad(id))?;
        self.membership.retain(|_, squad_id| *squad_id != id);
        info!("Disbanded {}", id);
        events.publish(AiEvent::SquadDisbanded { squad: id });
        Ok(squad)
    }

    /// Switches a squad's policy and applies it.
    pub fn set_policy(
        &mut self,
        id: SquadId,
        policy: SquadPolicy,
        registry: &mut AgentRegistry,
        controller: &mut BehaviorController,
        events: &EventBus,
    ) -> AiResult<()> {
        let squad = self
            .squads
            .get_mut(&id)
            .ok_or(ValidationError::UnknownSquad(id))?;
        squad.policy = policy;
        self.apply_policy(id, registry, controller, events);
        Ok(())
    }

    /// Puts members into the behavior the policy asks for.
    ///
    /// `Escort` sets every member to defend the leader. `Follow` releases
    /// members still escorting the leader back to idle so formation can
    /// drive them.
    fn apply_policy(
        &self,
        id: SquadId,
        registry: &mut AgentRegistry,
        controller: &mut BehaviorController,
        events: &EventBus,
    ) {
        let Some(squad) = self.squads.get(&id) else {
            return;
        };
        let escort = BehaviorState::DefendPlayer { target: squad.leader };
        for member in &squad.members {
            let Some(agent) = registry.get_mut(*member).filter(|a| a.is_alive()) else {
                continue;
            };
            match squad.policy {
                SquadPolicy::Escort if agent.state() != &escort => {
                    controller.apply(agent, escort.clone(), events);
                },
                SquadPolicy::Follow if agent.state() == &escort => {
                    controller.apply(agent, BehaviorState::Idle, events);
                },
                _ => {},
            }
        }
    }

    /// Prunes dead members, promotes a new leader when the old one is gone
    /// and dissolves squads with nobody left.
    pub fn reconcile(&mut self, registry: &mut AgentRegistry, controller: &mut BehaviorController, events: &EventBus) {
        let mut dissolved = Vec::new();
        let mut departed = Vec::new();

        for squad in self.squads.values_mut() {
            let before = squad.members.len();
            squad.members.retain(|m| {
                let alive = registry.is_alive(*m);
                if !alive {
                    departed.push(*m);
                }
                alive
            });
            let mut changed = squad.members.len() != before;

            if !registry.is_alive(squad.leader) {
                let previous = squad.leader;
                departed.push(previous);

                let Some(successor) = squad.members.iter().copied().min() else {
                    dissolved.push(squad.id);
                    continue;
                };
                squad.members.retain(|m| *m != successor);
                squad.leader = successor;
                changed = true;

                info!("{} leader {} lost, promoted {}", squad.id, previous, successor);
                events.publish(AiEvent::LeaderPromoted {
                    squad: squad.id,
                    previous,
                    leader: successor,
                });

                for member in &squad.members {
                    if let Some(agent) = registry.get_mut(*member) {
                        controller.rebind_escort(agent, previous, successor, events);
                    }
                }
                if let Some(agent) = registry.get_mut(successor) {
                    if agent.state() == &(BehaviorState::DefendPlayer { target: previous }) {
                        controller.apply(agent, BehaviorState::Idle, events);
                    }
                }
            }

            if changed {
                squad.respread(self.formation_radius);
            }
        }

        for agent in departed {
            self.membership.remove(&agent);
        }
        for id in dissolved {
            // Already checked present above.
            let _ = self.disband(id, events);
        }
    }

    /// Drives follow-policy members toward their formation slots.
    pub fn follow<W: WorldMut>(
        &self,
        dt: f32,
        registry: &AgentRegistry,
        controller: &BehaviorController,
        world: &mut W,
    ) {
        for squad in self.squads.values() {
            if squad.policy != SquadPolicy::Follow {
                continue;
            }
            let Some(anchor) = world.position(squad.leader) else {
                debug!("{} leader position unavailable, skipping formation", squad.id);
                continue;
            };
            for (member, offset) in squad.members.iter().zip(&squad.offsets) {
                let Some(agent) = registry.get(*member) else {
                    continue;
                };
                if !agent.is_alive() || !agent.state().accepts_formation() {
                    continue;
                }
                if let Err(fault) = controller.drive_toward(agent, anchor + *offset, dt, world) {
                    debug!("{} skipped formation step: {}", member, fault);
                }
            }
        }
    }

    /// Forgets a removed agent's membership. Its squad is reconciled on the
    /// next pass.
    pub fn forget(&mut self, agent: AgentId) {
        self.membership.remove(&agent);
    }
}
