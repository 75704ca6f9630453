//! Behavior state machine: transitions, per-state ticks and engagement.

use skirmish_common::{
    is_finite_position, planar_distance, project_to_ring, steer_toward, AgentId, AiError,
    ValidationError, Vec3,
};
use thiserror::Error;
use tracing::debug;

use crate::agent::{Agent, AgentRegistry, BehaviorSignal};
use crate::behavior::BehaviorState;
use crate::combat::{CombatService, EngagementIntent, EngagementTarget};
use crate::config::AiConfig;
use crate::edge::{EdgeDetectors, NamedCondition};
use crate::events::{AiEvent, EventBus};
use crate::targeting::{Resolution, ThreatScope, VisibilitySnapshot};
use crate::world::{WorldMut, WorldQuery};

/// Tolerance used when checking ring membership after a leash.
const RING_TOLERANCE: f32 = 1e-3;

/// Fault raised while ticking one agent.
///
/// Faults never escape the per-agent boundary: the scheduler logs them and
/// drops the agent back to idle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickFault {
    /// The agent's own position could not be read
    #[error("position of {0} unavailable")]
    PositionUnavailable(AgentId),
    /// Steering produced a non-finite position
    #[error("{0} steered to a non-finite position")]
    NonFiniteStep(AgentId),
    /// Patrol index points past the end of its path
    #[error("{agent} patrol index {index} out of range")]
    PatrolIndexOutOfRange {
        /// Agent
        agent: AgentId,
        /// Offending index
        index: usize,
    },
}

/// Result of ticking one agent.
pub type TickResult<T> = Result<T, TickFault>;

impl From<TickFault> for AiError {
    fn from(fault: TickFault) -> Self {
        match fault {
            TickFault::PositionUnavailable(agent) => Self::ResourceUnavailable {
                agent,
                what: "position",
            },
            TickFault::NonFiniteStep(_) => ValidationError::NonFinitePosition("steering step").into(),
            TickFault::PatrolIndexOutOfRange { agent, .. } => Self::ResourceUnavailable {
                agent,
                what: "patrol waypoint",
            },
        }
    }
}

/// Drives agents through their behavior states.
#[derive(Debug)]
pub struct BehaviorController {
    edges: EdgeDetectors,
    arrival_epsilon: f32,
    base_move_speed: f32,
    descent_rate: f32,
    threat_margin: f32,
    escort_radius: f32,
}

impl BehaviorController {
    /// Creates a controller with the movement tuning from `config`.
    #[must_use]
    pub fn new(config: &AiConfig) -> Self {
        Self {
            edges: EdgeDetectors::new(),
            arrival_epsilon: config.arrival_epsilon,
            base_move_speed: config.base_move_speed,
            descent_rate: config.parachute_descent_rate,
            threat_margin: config.defend_threat_margin,
            escort_radius: config.escort_radius,
        }
    }

    /// Edge detectors of every agent.
    #[must_use]
    pub fn edges(&self) -> &EdgeDetectors {
        &self.edges
    }

    /// Checks `state` for `agent`, including references to other agents.
    pub fn validate_transition(
        agent: AgentId,
        state: &BehaviorState,
        registry: &AgentRegistry,
    ) -> Result<(), ValidationError> {
        state.validate()?;
        if let BehaviorState::DefendPlayer { target } = state {
            if *target == agent {
                return Err(ValidationError::SelfEscort(agent));
            }
            if !registry.contains(*target) {
                return Err(ValidationError::UnknownAgent(*target));
            }
        }
        Ok(())
    }

    /// Discards the pending suspension, then transitions. The caller has
    /// validated `state`.
    pub fn apply(&mut self, agent: &mut Agent, state: BehaviorState, events: &EventBus) {
        if agent.suspension.take().is_some() {
            events.publish(AiEvent::SuspensionCancelled { agent: agent.id() });
        }
        self.transition(agent, state, events);
    }

    /// Replaces the agent's state, running exit actions of the old state and
    /// entry actions of the new one. The caller has validated `state`.
    pub fn transition(&mut self, agent: &mut Agent, mut state: BehaviorState, events: &EventBus) {
        let id = agent.id();
        let previous = agent.state.kind();

        self.stop_forced_fire(agent, events);
        self.edges.reset_agent(id);
        agent.signal = None;
        agent.targeting.natural = None;
        agent.targeting.expire();
        events.publish(AiEvent::BehaviorExited {
            agent: id,
            kind: previous,
        });

        if let BehaviorState::WaypointPatrol { index, .. } = &mut state {
            *index = 0;
        }
        let kind = state.kind();
        agent.state = state;
        events.publish(AiEvent::BehaviorEntered { agent: id, kind });

        debug!("{} behavior {:?} -> {:?}", id, previous, kind);
    }

    /// Ends forced fire, publishing the stop if it was active.
    pub fn stop_forced_fire(&self, agent: &mut Agent, events: &EventBus) {
        if agent.forced_fire {
            agent.forced_fire = false;
            events.publish(AiEvent::ForcedFireStopped { agent: agent.id() });
        }
    }

    /// Points an escort at a new protected agent without leaving the state.
    ///
    /// Returns `false` if the agent was not escorting `from`.
    pub fn rebind_escort(&self, agent: &mut Agent, from: AgentId, to: AgentId, events: &EventBus) -> bool {
        let id = agent.id();
        match &mut agent.state {
            BehaviorState::DefendPlayer { target } if *target == from => {
                *target = to;
                events.publish(AiEvent::EscortRebound {
                    agent: id,
                    from,
                    to,
                });
                true
            },
            _ => false,
        }
    }

    /// Forgets per-agent bookkeeping of a removed agent.
    pub fn forget(&mut self, agent: AgentId) {
        self.edges.reset_agent(agent);
    }

    /// Distance the agent may cover in `dt`.
    fn step_length(&self, agent: &Agent, dt: f32) -> f32 {
        agent.profile.move_speed_units(self.base_move_speed) * dt
    }

    /// Steers the agent toward `goal` at its own speed.
    pub fn drive_toward<W: WorldMut>(&self, agent: &Agent, goal: Vec3, dt: f32, world: &mut W) -> TickResult<Vec3> {
        let pos = own_position(agent, world)?;
        let next = steer_toward(pos, goal, self.step_length(agent, dt));
        commit(agent, world, next)
    }

    /// Runs one tick of the agent's active behavior.
    pub fn tick<W: WorldMut>(&mut self, agent: &mut Agent, dt: f32, world: &mut W, events: &EventBus) -> TickResult<()> {
        agent.signal = None;
        let id = agent.id();
        let step = self.step_length(agent, dt);

        match agent.state.clone() {
            BehaviorState::Idle | BehaviorState::BattlefieldAI => {},
            BehaviorState::MoveToLocation { dest } => {
                let next = self.drive_toward(agent, dest, dt, world)?;
                let arrived = next.distance(dest) < self.arrival_epsilon;
                if arrived {
                    agent.signal = Some(BehaviorSignal::Arrived);
                }
                if self.edges.update(id, NamedCondition::Arrived, arrived).just_triggered {
                    debug!("{} arrived at {:?}", id, dest);
                    events.publish(AiEvent::Arrived {
                        agent: id,
                        destination: dest,
                    });
                }
            },
            BehaviorState::WaypointPatrol { path, index } => {
                let goal = path
                    .get(index)
                    .ok_or(TickFault::PatrolIndexOutOfRange { agent: id, index })?;
                let next = self.drive_toward(agent, goal, dt, world)?;
                if next.distance(goal) < self.arrival_epsilon {
                    events.publish(AiEvent::WaypointReached { agent: id, index });
                    let advanced = index + 1;
                    if advanced < path.len() {
                        set_patrol_index(agent, advanced);
                    } else if path.looped() {
                        set_patrol_index(agent, 0);
                    } else {
                        debug!("{} finished patrol of {} waypoints", id, path.len());
                        events.publish(AiEvent::PatrolCompleted { agent: id });
                        self.transition(agent, BehaviorState::Idle, events);
                    }
                }
            },
            BehaviorState::DefendLocation {
                center,
                min_radius,
                max_radius,
            } => {
                let pos = own_position(agent, world)?;
                let dist = pos.distance(center);
                let next = if dist < min_radius {
                    steer_toward(pos, project_to_ring(center, pos, min_radius), step)
                } else if dist > max_radius {
                    let rim = project_to_ring(center, pos, max_radius);
                    let stepped = steer_toward(pos, rim, step);
                    // Leash: never finish a tick outside the ring.
                    if stepped.distance(center) > max_radius {
                        rim
                    } else {
                        stepped
                    }
                } else {
                    pos
                };
                let next = commit(agent, world, next)?;
                let dist = next.distance(center);
                let holding = dist >= min_radius - RING_TOLERANCE && dist <= max_radius + RING_TOLERANCE;
                if self.edges.update(id, NamedCondition::HoldingPosition, holding).just_triggered {
                    events.publish(AiEvent::HoldingPosition { agent: id });
                }
            },
            BehaviorState::DefendPlayer { target } => {
                let pos = own_position(agent, world)?;
                // Protected agent gone or unreadable: hold.
                if let Some(protected) = world.position(target) {
                    let gap = pos.distance(protected) - self.escort_radius;
                    if gap > 0.0 {
                        commit(agent, world, steer_toward(pos, protected, gap.min(step)))?;
                    }
                }
            },
            BehaviorState::Parachute { landing_zone } => {
                let pos = own_position(agent, world)?;
                let ground = Vec3::new(landing_zone.x, pos.y, landing_zone.z);
                let mut next = steer_toward(pos, ground, step);
                let fall = self.descent_rate * dt;
                next.y = pos.y + (landing_zone.y - pos.y).clamp(-fall, fall);
                let next = commit(agent, world, next)?;
                let landed = planar_distance(next, landing_zone) < self.arrival_epsilon
                    && (next.y - landing_zone.y).abs() < self.arrival_epsilon;
                if landed {
                    agent.signal = Some(BehaviorSignal::Landed);
                }
                if self.edges.update(id, NamedCondition::Landed, landed).just_triggered {
                    debug!("{} landed at {:?}", id, landing_zone);
                    events.publish(AiEvent::Landed { agent: id, landing_zone });
                }
            },
        }
        Ok(())
    }

    /// Whether the active state engages `target` on its own.
    fn state_engages(&self, agent: &Agent, target: AgentId, snapshot: &VisibilitySnapshot) -> bool {
        match &agent.state {
            BehaviorState::BattlefieldAI | BehaviorState::DefendPlayer { .. } => true,
            state @ BehaviorState::DefendLocation { .. } => snapshot
                .position(target)
                .is_some_and(|pos| ThreatScope::for_state(state, self.threat_margin).admits(pos)),
            _ => false,
        }
    }

    /// Builds this tick's engagement intent, if the agent should shoot.
    #[must_use]
    pub fn engagement(
        &self,
        agent: &Agent,
        resolution: Resolution,
        snapshot: &VisibilitySnapshot,
    ) -> Option<EngagementIntent> {
        if !agent.shooting_enabled {
            return None;
        }
        let intent = if agent.forced_fire {
            let target = match (resolution.target, agent.focus_point) {
                (Some(target), _) => EngagementTarget::Agent(target),
                (None, Some(point)) => EngagementTarget::Point(point),
                (None, None) => EngagementTarget::Forward,
            };
            EngagementIntent::new(agent.id(), target, agent.profile).forced()
        } else {
            let target = resolution.target?;
            if !resolution.forced && !self.state_engages(agent, target, snapshot) {
                return None;
            }
            EngagementIntent::new(agent.id(), EngagementTarget::Agent(target), agent.profile)
        };
        Some(intent.with_aim(agent.focus_point))
    }

    /// Forwards this tick's engagement intent to the combat service.
    pub fn engage<C: CombatService>(
        &self,
        agent: &Agent,
        resolution: Resolution,
        snapshot: &VisibilitySnapshot,
        combat: &mut C,
    ) -> bool {
        match self.engagement(agent, resolution, snapshot) {
            Some(intent) => {
                combat.submit(intent);
                true
            },
            None => false,
        }
    }
}

fn own_position<W: WorldMut>(agent: &Agent, world: &W) -> TickResult<Vec3> {
    world
        .position(agent.id())
        .ok_or(TickFault::PositionUnavailable(agent.id()))
}

fn commit<W: WorldMut>(agent: &Agent, world: &mut W, next: Vec3) -> TickResult<Vec3> {
    if !is_finite_position(next) {
        return Err(TickFault::NonFiniteStep(agent.id()));
    }
    world.set_position(agent.id(), next);
    Ok(next)
}

fn set_patrol_index(agent: &mut Agent, next: usize) {
    if let BehaviorState::WaypointPatrol { index, .. } = &mut agent.state {
        *index = next;
    }
}
