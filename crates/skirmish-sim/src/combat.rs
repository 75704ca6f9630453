//! Demo combat resolution: turns engagement intents into hits and kills.

use ahash::AHashMap;
use skirmish_ai::{EngagementIntent, EngagementTarget, Scheduler, SandboxWorld, WorldQuery};
use skirmish_common::AgentId;
use tracing::debug;

/// Damage dealt by one hit before multipliers.
const BASE_DAMAGE: f32 = 12.0;

/// Seconds between two shots of the same attacker.
const FIRE_INTERVAL: f64 = 0.25;

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombatStats {
    /// Shots fired
    pub shots: u32,
    /// Shots that hit an agent
    pub hits: u32,
    /// Agents killed
    pub kills: u32,
    /// Total damage applied
    pub damage: f32,
}

/// Resolves queued intents against the sandbox world.
#[derive(Debug)]
pub struct CombatResolver {
    rng_state: u64,
    next_shot_at: AHashMap<AgentId, f64>,
    stats: CombatStats,
}

impl CombatResolver {
    /// Creates a resolver with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng_state: seed,
            next_shot_at: AHashMap::new(),
            stats: CombatStats::default(),
        }
    }

    /// Totals so far.
    #[must_use]
    pub const fn stats(&self) -> CombatStats {
        self.stats
    }

    /// Simple LCG, returns a value in `[0, 1)`.
    fn roll(&mut self) -> f32 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.rng_state >> 40) as f32) / ((1u64 << 24) as f32)
    }

    /// Applies one tick's intents and returns the agents killed.
    pub fn resolve(
        &mut self,
        intents: Vec<EngagementIntent>,
        now: f64,
        scheduler: &Scheduler,
        world: &mut SandboxWorld,
    ) -> Vec<AgentId> {
        let mut killed = Vec::new();

        for intent in intents {
            let ready = self
                .next_shot_at
                .get(&intent.attacker)
                .map_or(true, |at| now >= *at);
            if !ready {
                continue;
            }
            self.next_shot_at.insert(intent.attacker, now + FIRE_INTERVAL);
            self.stats.shots += 1;

            let EngagementTarget::Agent(victim) = intent.target else {
                continue;
            };
            if killed.contains(&victim) || self.roll() >= intent.profile.accuracy_hint {
                continue;
            }
            let Some(health) = world.health(victim).filter(|h| *h > 0.0) else {
                continue;
            };
            let taken = scheduler
                .agent(victim)
                .map_or(1.0, |a| a.profile().damage_in_multiplier);
            let damage = BASE_DAMAGE * intent.profile.damage_out_multiplier * taken;

            self.stats.hits += 1;
            self.stats.damage += damage;
            let remaining = (health - damage).max(0.0);
            world.set_health(victim, remaining);

            if remaining <= 0.0 {
                debug!("{} killed {}", intent.attacker, victim);
                self.stats.kills += 1;
                killed.push(victim);
            }
        }

        killed
    }
}
