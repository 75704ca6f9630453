//! Two-team demo skirmish on a sandbox world.

use anyhow::{Context, Result};
use skirmish_ai::{
    AiConfig, AiEvent, BehaviorState, Continuation, DifficultyProfile, DifficultyTier, IntentQueue,
    MoveSpeedClass, SandboxWorld, Scheduler, SquadPolicy, Suspension, WaitCondition, WaypointPath,
};
use skirmish_common::{AgentId, TeamId, Vec3};
use tracing::{debug, info};

use crate::combat::{CombatResolver, CombatStats};

/// Fixed simulation step.
pub const TICK_DT: f32 = 1.0 / 60.0;

/// Dead agents are despawned after this many seconds.
const CORPSE_TIME: f64 = 3.0;

const BLUE: TeamId = TeamId::new(1);
const RED: TeamId = TeamId::new(2);

/// What the run ended with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Ticks run
    pub ticks: u64,
    /// Simulated seconds
    pub seconds: f64,
    /// Blue agents still alive
    pub blue_alive: usize,
    /// Red agents still alive
    pub red_alive: usize,
    /// Per-agent tick faults
    pub faults: usize,
    /// Events published
    pub events: usize,
    /// Combat totals
    pub combat: CombatStats,
}

/// A running skirmish.
pub struct Skirmish {
    scheduler: Scheduler,
    world: SandboxWorld,
    intents: IntentQueue,
    combat: CombatResolver,
    /// Dead agents waiting for despawn, with their time of death
    corpses: Vec<(AgentId, f64)>,
    faults: usize,
    events: usize,
}

impl Skirmish {
    /// Spawns both teams and hands out their orders.
    pub fn setup(config: AiConfig) -> Result<Self> {
        let mut skirmish = Self {
            scheduler: Scheduler::new(config),
            world: SandboxWorld::new(),
            intents: IntentQueue::new(),
            combat: CombatResolver::new(0x5eed),
            corpses: Vec::new(),
            faults: 0,
            events: 0,
        };
        skirmish.deploy_blue()?;
        skirmish.deploy_red()?;
        info!(
            "Deployed {} agents in {} squads",
            skirmish.scheduler.registry().len(),
            skirmish.scheduler.squads().len()
        );
        Ok(skirmish)
    }

    fn spawn(&mut self, raw: u32, team: TeamId, pos: Vec3) -> Result<AgentId> {
        let id = AgentId::new(raw);
        self.scheduler
            .agent_spawned(id, team, pos)
            .with_context(|| format!("spawning {id}"))?;
        self.world.place(id, pos, 100.0);
        Ok(id)
    }

    fn deploy_blue(&mut self) -> Result<()> {
        // Assault squad: leader walks to the objective, the rest follow.
        let leader = self.spawn(1, BLUE, Vec3::new(0.0, 0.0, 0.0))?;
        let left = self.spawn(2, BLUE, Vec3::new(4.0, 0.0, 0.0))?;
        let right = self.spawn(3, BLUE, Vec3::new(-4.0, 0.0, 0.0))?;
        self.scheduler.create_squad(leader, &[left, right])?;

        let objective = Vec3::new(55.0, 0.0, 55.0);
        self.scheduler
            .set_behavior(leader, BehaviorState::MoveToLocation { dest: objective })?;
        self.scheduler.suspend(
            leader,
            Suspension::until(
                WaitCondition::Arrived,
                Continuation::SetBehavior(BehaviorState::BattlefieldAI),
            ),
        )?;

        // Perimeter patrol around the spawn.
        let sentry = self.spawn(4, BLUE, Vec3::new(-10.0, 0.0, -10.0))?;
        let perimeter = WaypointPath::new(
            vec![
                Vec3::new(-10.0, 0.0, -10.0),
                Vec3::new(10.0, 0.0, -10.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(-10.0, 0.0, 10.0),
            ],
            true,
        )?;
        self.scheduler
            .set_behavior(sentry, BehaviorState::patrol(perimeter))?;

        // Paratrooper dropping behind the red line.
        let para = self.spawn(5, BLUE, Vec3::new(90.0, 80.0, 90.0))?;
        self.scheduler.set_behavior(
            para,
            BehaviorState::Parachute {
                landing_zone: Vec3::new(85.0, 0.0, 85.0),
            },
        )?;
        self.scheduler.suspend(
            para,
            Suspension::until(
                WaitCondition::Arrived,
                Continuation::SetBehavior(BehaviorState::BattlefieldAI),
            ),
        )?;
        self.scheduler.set_difficulty_profile(
            para,
            DifficultyProfile::preset(DifficultyTier::Veteran),
        )?;
        Ok(())
    }

    fn deploy_red(&mut self) -> Result<()> {
        // Commander holds the hill with two escorts.
        let hill = Vec3::new(70.0, 0.0, 70.0);
        let commander = self.spawn(10, RED, Vec3::new(70.0, 0.0, 78.0))?;
        let guard_a = self.spawn(11, RED, Vec3::new(75.0, 0.0, 80.0))?;
        let guard_b = self.spawn(12, RED, Vec3::new(65.0, 0.0, 80.0))?;
        self.scheduler
            .set_behavior(commander, BehaviorState::defend(hill, 3.0, 15.0))?;
        self.scheduler
            .create_squad_with_policy(commander, &[guard_a, guard_b], SquadPolicy::Escort)?;

        // Roaming elite and a rookie with suppressive fire.
        let elite = self.spawn(13, RED, Vec3::new(40.0, 0.0, 80.0))?;
        self.scheduler
            .set_behavior(elite, BehaviorState::BattlefieldAI)?;
        self.scheduler
            .set_difficulty_profile(elite, DifficultyProfile::preset(DifficultyTier::Elite))?;

        let rookie = self.spawn(14, RED, Vec3::new(80.0, 0.0, 40.0))?;
        self.scheduler.set_behavior(rookie, BehaviorState::BattlefieldAI)?;
        self.scheduler.set_difficulty_profile(
            rookie,
            DifficultyProfile::preset(DifficultyTier::Recruit).with_move_speed(MoveSpeedClass::Walk),
        )?;
        self.scheduler
            .set_focus_point(rookie, Vec3::new(40.0, 1.5, 40.0))?;
        self.scheduler.force_fire(rookie, 2.0)?;
        Ok(())
    }

    /// Runs one fixed step.
    pub fn step(&mut self) -> Result<()> {
        let report = self
            .scheduler
            .tick(TICK_DT, &mut self.world, &mut self.intents);
        self.faults += report.faults;

        let now = self.scheduler.now();
        let killed = self
            .combat
            .resolve(self.intents.drain(), now, &self.scheduler, &mut self.world);
        for victim in killed {
            self.scheduler.agent_killed(victim)?;
            self.corpses.push((victim, now));
        }

        let (expired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.corpses)
            .into_iter()
            .partition(|(_, died)| now - *died >= CORPSE_TIME);
        self.corpses = waiting;
        for (corpse, _) in expired {
            self.scheduler.agent_despawned(corpse)?;
            self.world.remove(corpse);
        }

        for event in self.scheduler.drain_events() {
            self.events += 1;
            match event {
                AiEvent::LeaderPromoted { squad, leader, .. } => info!("{} now led by {}", squad, leader),
                AiEvent::Landed { agent, .. } => info!("{} touched down", agent),
                AiEvent::AgentFaulted { agent, reason } => info!("{} faulted: {}", agent, reason),
                AiEvent::Notify { agent, label } => info!("{}: {}", agent, label),
                other => debug!("{:?}", other),
            }
        }
        Ok(())
    }

    /// Runs for `seconds` of simulated time or until a team is wiped out.
    pub fn run(&mut self, seconds: f64) -> Result<Summary> {
        let mut next_report = 10.0;
        while self.scheduler.now() < seconds {
            self.step()?;

            let summary = self.summary();
            if self.scheduler.now() >= next_report {
                next_report += 10.0;
                info!(
                    "t={:.0}s blue={} red={} kills={}",
                    summary.seconds, summary.blue_alive, summary.red_alive, summary.combat.kills
                );
            }
            if summary.blue_alive == 0 || summary.red_alive == 0 {
                info!("A team was wiped out at t={:.1}s", summary.seconds);
                break;
            }
        }
        Ok(self.summary())
    }

    /// Current totals.
    pub fn summary(&self) -> Summary {
        let registry = self.scheduler.registry();
        Summary {
            ticks: self.scheduler.tick_count(),
            seconds: self.scheduler.now(),
            blue_alive: registry.team_alive_count(BLUE),
            red_alive: registry.team_alive_count(RED),
            faults: self.faults,
            events: self.events,
            combat: self.combat.stats(),
        }
    }
}
