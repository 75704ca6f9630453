//! Cooperative tick loop and the public command surface of the AI core.
//!
//! One [`Scheduler::tick`] advances simulated time, captures the visibility
//! snapshot, ticks every live agent in creation order and finally updates
//! squads. Per agent, the order is: pending difficulty profile, suspension
//! wake-up, target resolution, behavior step, engagement.

use skirmish_common::{is_finite_position, AgentId, AiError, AiResult, SquadId, TeamId, ValidationError, Vec3};
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentRegistry};
use crate::behavior::BehaviorState;
use crate::combat::CombatService;
use crate::config::AiConfig;
use crate::controller::{BehaviorController, TickResult};
use crate::difficulty::DifficultyProfile;
use crate::events::{AiEvent, EventBus};
use crate::squad::{SquadCoordinator, SquadPolicy};
use crate::suspension::{Continuation, Suspension, WaitCondition, Wake, WakeContext};
use crate::targeting::{Resolution, TargetResolver, VisibilitySnapshot};
use crate::world::WorldMut;

/// Summary of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Simulated time after the tick (seconds)
    pub now: f64,
    /// Live agents ticked
    pub agents_ticked: usize,
    /// Agents that faulted and fell back to idle
    pub faults: usize,
    /// Engagement intents submitted
    pub intents: usize,
    /// Suspensions that woke
    pub resumed: usize,
}

/// Owns every agent and squad and runs the tick loop.
#[derive(Debug)]
pub struct Scheduler {
    config: AiConfig,
    registry: AgentRegistry,
    controller: BehaviorController,
    resolver: TargetResolver,
    squads: SquadCoordinator,
    events: EventBus,
    now: f64,
    tick: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(AiConfig::default())
    }
}

/// Checks that `id` is a live agent, logging the ignored command otherwise.
fn ensure_alive(registry: &AgentRegistry, id: AgentId, command: &str) -> AiResult<()> {
    if registry.is_alive(id) {
        Ok(())
    } else {
        warn!("{} ignored: {} is not a live agent", command, id);
        Err(AiError::InvalidAgent(id))
    }
}

fn publish_target_change(events: &EventBus, agent: AgentId, previous: Option<AgentId>, resolution: Resolution) {
    if previous == resolution.target {
        return;
    }
    match (resolution.target, previous) {
        (Some(target), _) => events.publish(AiEvent::TargetAcquired {
            agent,
            target,
            forced: resolution.forced,
        }),
        (None, Some(previous)) => events.publish(AiEvent::TargetLost { agent, previous }),
        (None, None) => {},
    }
}

impl Scheduler {
    /// Creates a scheduler. Out-of-range config values are clamped.
    #[must_use]
    pub fn new(mut config: AiConfig) -> Self {
        config.validate();
        Self {
            registry: AgentRegistry::new(),
            controller: BehaviorController::new(&config),
            resolver: TargetResolver::new(&config),
            squads: SquadCoordinator::new(config.formation_radius),
            events: EventBus::new(config.event_capacity),
            config,
            now: 0.0,
            tick: 0,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Simulated time in seconds.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks run.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Agent registry.
    #[must_use]
    pub const fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Squads.
    #[must_use]
    pub const fn squads(&self) -> &SquadCoordinator {
        &self.squads
    }

    /// Event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Removes and returns every pending event.
    pub fn drain_events(&self) -> Vec<AiEvent> {
        self.events.drain()
    }

    /// Gets an agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.registry.get(id)
    }

    /// Active behavior of an agent.
    #[must_use]
    pub fn current_behavior(&self, id: AgentId) -> Option<&BehaviorState> {
        self.registry.get(id).map(Agent::state)
    }

    /// Target resolved on the agent's last tick.
    #[must_use]
    pub fn current_target(&self, id: AgentId) -> Option<AgentId> {
        self.registry.get(id).and_then(|a| a.targeting().current())
    }

    // === Lifecycle ===

    /// Registers a freshly spawned agent.
    pub fn agent_spawned(&mut self, id: AgentId, team: TeamId, spawn_point: Vec3) -> AiResult<()> {
        if !is_finite_position(spawn_point) {
            return Err(ValidationError::NonFinitePosition("spawn point").into());
        }
        self.registry.register(id, team, spawn_point)?;
        debug!("Registered {} on team {}", id, team.raw());
        self.events.publish(AiEvent::AgentRegistered { agent: id });
        Ok(())
    }

    /// Marks an agent dead. Forced targets on it are dropped and squads
    /// promote a new leader immediately.
    pub fn agent_killed(&mut self, id: AgentId) -> AiResult<()> {
        if !self.registry.contains(id) {
            return Err(AiError::InvalidAgent(id));
        }
        if !self.registry.mark_dead(id) {
            return Ok(());
        }
        debug!("{} killed", id);
        self.events.publish(AiEvent::AgentDied { agent: id });
        self.forget_as_target(id);
        self.squads
            .reconcile(&mut self.registry, &mut self.controller, &self.events);
        Ok(())
    }

    /// Removes an agent for good.
    pub fn agent_despawned(&mut self, id: AgentId) -> AiResult<()> {
        if self.registry.remove(id).is_none() {
            return Err(AiError::InvalidAgent(id));
        }
        debug!("{} despawned", id);
        self.controller.forget(id);
        self.forget_as_target(id);
        self.squads
            .reconcile(&mut self.registry, &mut self.controller, &self.events);
        self.squads.forget(id);
        self.events.publish(AiEvent::AgentRemoved { agent: id });
        Ok(())
    }

    fn forget_as_target(&mut self, id: AgentId) {
        for agent in self.registry.values_mut() {
            if agent.forced_target == Some(id) {
                agent.forced_target = None;
                agent.targeting.expire();
            }
            if agent.targeting.current == Some(id) {
                agent.targeting.current = None;
            }
        }
    }

    // === Behavior commands ===

    /// Switches an agent's behavior.
    ///
    /// Discards the agent's pending suspension, runs exit actions of the old
    /// state, then entry actions of the new one. Nothing changes on error.
    pub fn set_behavior(&mut self, id: AgentId, state: BehaviorState) -> AiResult<()> {
        ensure_alive(&self.registry, id, "set_behavior")?;
        BehaviorController::validate_transition(id, &state, &self.registry)?;
        let agent = self.registry.alive_mut(id)?;
        self.controller.apply(agent, state, &self.events);
        Ok(())
    }

    /// Forces a target, overriding natural resolution while it stays valid.
    pub fn set_target(&mut self, id: AgentId, target: AgentId) -> AiResult<()> {
        ensure_alive(&self.registry, id, "set_target")?;
        if !self.registry.contains(target) {
            return Err(ValidationError::UnknownAgent(target).into());
        }
        if !self.registry.is_alive(target) {
            return Err(AiError::InvalidAgent(target));
        }
        self.registry.alive_mut(id)?.forced_target = Some(target);
        Ok(())
    }

    /// Drops the forced target; natural resolution runs on the next tick.
    pub fn clear_target(&mut self, id: AgentId) -> AiResult<()> {
        ensure_alive(&self.registry, id, "clear_target")?;
        let agent = self.registry.alive_mut(id)?;
        agent.forced_target = None;
        agent.targeting.expire();
        Ok(())
    }

    /// Sets the aim point for engagements.
    pub fn set_focus_point(&mut self, id: AgentId, point: Vec3) -> AiResult<()> {
        ensure_alive(&self.registry, id, "set_focus_point")?;
        if !is_finite_position(point) {
            return Err(ValidationError::NonFinitePosition("focus point").into());
        }
        self.registry.alive_mut(id)?.focus_point = Some(point);
        Ok(())
    }

    /// Clears the aim point.
    pub fn clear_focus_point(&mut self, id: AgentId) -> AiResult<()> {
        ensure_alive(&self.registry, id, "clear_focus_point")?;
        self.registry.alive_mut(id)?.focus_point = None;
        Ok(())
    }

    /// Allows or forbids engagement intents.
    pub fn enable_shooting(&mut self, id: AgentId, enabled: bool) -> AiResult<()> {
        ensure_alive(&self.registry, id, "enable_shooting")?;
        self.registry.alive_mut(id)?.shooting_enabled = enabled;
        Ok(())
    }

    /// Allows or forbids natural target resolution.
    pub fn enable_targeting(&mut self, id: AgentId, enabled: bool) -> AiResult<()> {
        ensure_alive(&self.registry, id, "enable_targeting")?;
        let agent = self.registry.alive_mut(id)?;
        agent.targeting_enabled = enabled;
        agent.targeting.expire();
        Ok(())
    }

    /// Queues a difficulty profile for the agent's next tick.
    pub fn set_difficulty_profile(&mut self, id: AgentId, profile: DifficultyProfile) -> AiResult<()> {
        ensure_alive(&self.registry, id, "set_difficulty_profile")?;
        self.registry.alive_mut(id)?.pending_profile = Some(profile);
        Ok(())
    }

    /// Fires at the current target (or focus point) for `duration` seconds.
    ///
    /// The stop is a timed suspension, so a later `set_behavior` cancels it
    /// together with the fire.
    pub fn force_fire(&mut self, id: AgentId, duration: f64) -> AiResult<()> {
        ensure_alive(&self.registry, id, "force_fire")?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ValidationError::InvalidDuration(duration).into());
        }
        let wake_at = self.now + duration;
        let agent = self.registry.alive_mut(id)?;
        agent.forced_fire = true;
        self.events
            .publish(AiEvent::ForcedFireStarted { agent: id, duration });
        replace_suspension(agent, Suspension::at(wake_at, Continuation::StopForcedFire), &self.events);
        Ok(())
    }

    /// Attaches a suspension, replacing any pending one.
    pub fn suspend(&mut self, id: AgentId, suspension: Suspension) -> AiResult<()> {
        ensure_alive(&self.registry, id, "suspend")?;
        self.validate_suspension(id, &suspension)?;
        let agent = self.registry.alive_mut(id)?;
        replace_suspension(agent, suspension, &self.events);
        Ok(())
    }

    /// Runs `continuation` after `delay` simulated seconds.
    pub fn suspend_for(&mut self, id: AgentId, delay: f64, continuation: Continuation) -> AiResult<()> {
        if !delay.is_finite() || delay < 0.0 {
            ensure_alive(&self.registry, id, "suspend_for")?;
            return Err(ValidationError::InvalidDuration(delay).into());
        }
        self.suspend(id, Suspension::at(self.now + delay, continuation))
    }

    fn validate_suspension(&self, id: AgentId, suspension: &Suspension) -> Result<(), ValidationError> {
        match suspension.wake {
            Wake::At(time) if !time.is_finite() => return Err(ValidationError::InvalidDuration(time)),
            Wake::Until(WaitCondition::WithinDistanceOf { point, radius }) => {
                if !is_finite_position(point) {
                    return Err(ValidationError::NonFinitePosition("wait point"));
                }
                if !radius.is_finite() || radius < 0.0 {
                    return Err(ValidationError::InvalidRadius(radius));
                }
            },
            _ => {},
        }
        if let Continuation::SetBehavior(state) = &suspension.continuation {
            BehaviorController::validate_transition(id, state, &self.registry)?;
        }
        Ok(())
    }

    // === Squads ===

    /// Forms a follow squad.
    pub fn create_squad(&mut self, leader: AgentId, members: &[AgentId]) -> AiResult<SquadId> {
        self.create_squad_with_policy(leader, members, SquadPolicy::Follow)
    }

    /// Forms a squad with an explicit policy.
    pub fn create_squad_with_policy(
        &mut self,
        leader: AgentId,
        members: &[AgentId],
        policy: SquadPolicy,
    ) -> AiResult<SquadId> {
        self.squads.create(
            leader,
            members,
            policy,
            &mut self.registry,
            &mut self.controller,
            &self.events,
        )
    }

    /// Dissolves a squad.
    pub fn disband(&mut self, squad: SquadId) -> AiResult<()> {
        self.squads.disband(squad, &self.events).map(|_| ())
    }

    /// Changes a squad's policy.
    pub fn set_squad_policy(&mut self, squad: SquadId, policy: SquadPolicy) -> AiResult<()> {
        self.squads.set_policy(
            squad,
            policy,
            &mut self.registry,
            &mut self.controller,
            &self.events,
        )
    }

    // === Tick ===

    /// Advances the simulation by `dt` seconds.
    pub fn tick<W: WorldMut, C: CombatService>(&mut self, dt: f32, world: &mut W, combat: &mut C) -> TickReport {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            warn!("Ignoring invalid tick delta {}", dt);
            0.0
        };
        self.tick += 1;
        self.now += f64::from(dt);

        let roster: Vec<(AgentId, TeamId)> = self
            .registry
            .iter()
            .filter(|a| a.is_alive())
            .map(|a| (a.id(), a.team()))
            .collect();
        let snapshot = VisibilitySnapshot::capture(self.tick, &roster, &*world, self.config.sight_range);

        let mut report = TickReport {
            tick: self.tick,
            now: self.now,
            ..TickReport::default()
        };

        for &(id, _) in &roster {
            if !self.registry.is_alive(id) {
                continue;
            }
            report.agents_ticked += 1;
            if let Err(fault) = self.tick_agent(id, dt, &snapshot, world, combat, &mut report) {
                let error = AiError::from(fault);
                error!("{} faulted, falling back to idle: {}", id, error);
                report.faults += 1;
                self.events.publish(AiEvent::AgentFaulted {
                    agent: id,
                    reason: error.to_string(),
                });
                if let Ok(agent) = self.registry.alive_mut(id) {
                    self.controller.apply(agent, BehaviorState::Idle, &self.events);
                }
            }
        }

        self.squads
            .reconcile(&mut self.registry, &mut self.controller, &self.events);
        self.squads
            .follow(dt, &self.registry, &self.controller, world);

        report
    }

    fn tick_agent<W: WorldMut, C: CombatService>(
        &mut self,
        id: AgentId,
        dt: f32,
        snapshot: &VisibilitySnapshot,
        world: &mut W,
        combat: &mut C,
        report: &mut TickReport,
    ) -> TickResult<()> {
        let now = self.now;

        let Ok(agent) = self.registry.alive_mut(id) else {
            return Ok(());
        };
        if let Some(profile) = agent.pending_profile.take() {
            debug!("{} difficulty profile applied", id);
            agent.profile = profile;
        }

        let wake = WakeContext {
            now,
            arrived: agent.signal.is_some(),
            has_target: agent.targeting.current.is_some(),
            position: snapshot.position(id),
        };
        if agent.suspension.as_ref().is_some_and(|s| s.is_due(&wake)) {
            if let Some(suspension) = agent.suspension.take() {
                self.events.publish(AiEvent::SuspensionResumed { agent: id });
                report.resumed += 1;
                self.resume(id, suspension.continuation);
            }
        }

        let Ok(agent) = self.registry.alive_mut(id) else {
            return Ok(());
        };
        let previous = agent.targeting.current;
        let resolution = self.resolver.resolve(agent, snapshot, now);
        publish_target_change(&self.events, id, previous, resolution);

        self.controller.tick(agent, dt, world, &self.events)?;

        if self.controller.engage(agent, resolution, snapshot, combat) {
            report.intents += 1;
        }
        Ok(())
    }

    fn resume(&mut self, id: AgentId, continuation: Continuation) {
        match continuation {
            Continuation::StopForcedFire => {
                if let Ok(agent) = self.registry.alive_mut(id) {
                    self.controller.stop_forced_fire(agent, &self.events);
                }
            },
            Continuation::SetBehavior(state) => {
                if let Err(e) = self.set_behavior(id, state) {
                    warn!("Deferred behavior change for {} rejected: {}", id, e);
                }
            },
            Continuation::ClearTarget => {
                if let Ok(agent) = self.registry.alive_mut(id) {
                    agent.forced_target = None;
                    agent.targeting.expire();
                }
            },
            Continuation::Notify(label) => {
                info!("{} notify: {}", id, label);
                self.events.publish(AiEvent::Notify { agent: id, label });
            },
        }
    }
}

fn replace_suspension(agent: &mut Agent, suspension: Suspension, events: &EventBus) {
    if agent.suspension.replace(suspension).is_some() {
        events.publish(AiEvent::SuspensionCancelled { agent: agent.id() });
    }
}
