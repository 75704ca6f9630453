//! Visibility snapshots and combat target resolution.
//!
//! The snapshot is captured once per tick, before any agent acts, and is
//! read-only afterwards: every agent resolves against the same picture of the
//! world. Capture runs the per-observer queries in parallel.

use ahash::{AHashSet, RandomState};
use rayon::prelude::*;
use skirmish_common::{AgentId, TeamId, Vec3};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::agent::Agent;
use crate::behavior::BehaviorState;
use crate::config::{AiConfig, TieBreak};
use crate::world::WorldQuery;

type FastMap<K, V> = HashMap<K, V, RandomState>;

/// One potential target as seen by one observer this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCandidate {
    /// Candidate agent
    pub id: AgentId,
    /// Candidate position at capture time
    pub position: Vec3,
    /// Distance from the observer
    pub distance: f32,
    /// Line of sight and within sight range
    pub visible: bool,
    /// Current health, used for tie-breaks
    pub health: f32,
    /// On a hostile team
    pub hostile: bool,
}

/// Everything one observer can see this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverView {
    position: Vec3,
    /// Sorted by id
    candidates: Vec<TargetCandidate>,
    degraded: bool,
}

impl ObserverView {
    /// Creates a view; `degraded` marks that some candidate had to be dropped.
    #[must_use]
    pub fn new(position: Vec3, mut candidates: Vec<TargetCandidate>, degraded: bool) -> Self {
        candidates.sort_by_key(|c| c.id);
        Self {
            position,
            candidates,
            degraded,
        }
    }

    /// Observer position at capture time.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Candidates, ordered by id.
    #[must_use]
    pub fn candidates(&self) -> &[TargetCandidate] {
        &self.candidates
    }

    /// Looks up one candidate.
    #[must_use]
    pub fn candidate(&self, id: AgentId) -> Option<&TargetCandidate> {
        self.candidates
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|index| &self.candidates[index])
    }

    /// Whether some candidate's world data was unavailable.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Immutable per-tick picture of who can see whom.
#[derive(Debug, Clone, Default)]
pub struct VisibilitySnapshot {
    tick: u64,
    roster: AHashSet<AgentId>,
    positions: FastMap<AgentId, Vec3>,
    views: FastMap<AgentId, ObserverView>,
}

impl VisibilitySnapshot {
    /// Captures the snapshot for the live `roster`.
    ///
    /// A candidate whose position, health or line of sight cannot be read is
    /// left out of that observer's view, and the view is marked degraded.
    /// Observers whose own position is unavailable get no view at all.
    pub fn capture<W: WorldQuery>(tick: u64, roster: &[(AgentId, TeamId)], world: &W, sight_range: f32) -> Self {
        let positions: FastMap<AgentId, Vec3> = roster
            .par_iter()
            .filter_map(|&(id, _)| world.position(id).map(|pos| (id, pos)))
            .collect();

        let views: FastMap<AgentId, ObserverView> = roster
            .par_iter()
            .filter_map(|&(observer, team)| {
                let origin = *positions.get(&observer)?;
                let mut degraded = false;
                let mut candidates = Vec::with_capacity(roster.len().saturating_sub(1));

                for &(other, other_team) in roster {
                    if other == observer {
                        continue;
                    }
                    let Some(&pos) = positions.get(&other) else {
                        degraded = true;
                        continue;
                    };
                    let (Some(health), Some(los)) = (world.health(other), world.line_of_sight(observer, other)) else {
                        degraded = true;
                        continue;
                    };
                    let distance = origin.distance(pos);
                    candidates.push(TargetCandidate {
                        id: other,
                        position: pos,
                        distance,
                        visible: los && distance <= sight_range,
                        health,
                        hostile: team.is_hostile_to(other_team),
                    });
                }

                Some((observer, ObserverView::new(origin, candidates, degraded)))
            })
            .collect();

        Self {
            tick,
            roster: roster.iter().map(|&(id, _)| id).collect(),
            positions,
            views,
        }
    }

    /// Builds a snapshot from prepared views. Every observer is in the roster.
    #[must_use]
    pub fn from_views(tick: u64, views: impl IntoIterator<Item = (AgentId, ObserverView)>) -> Self {
        let views: FastMap<AgentId, ObserverView> = views.into_iter().collect();
        Self {
            tick,
            roster: views.keys().copied().collect(),
            positions: views.iter().map(|(id, view)| (*id, view.position())).collect(),
            views,
        }
    }

    /// Tick the snapshot was captured on.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// View of one observer.
    #[must_use]
    pub fn view(&self, observer: AgentId) -> Option<&ObserverView> {
        self.views.get(&observer)
    }

    /// Position of an agent at capture time.
    #[must_use]
    pub fn position(&self, agent: AgentId) -> Option<Vec3> {
        self.positions.get(&agent).copied()
    }

    /// Whether the agent was alive at capture time.
    #[must_use]
    pub fn is_alive(&self, agent: AgentId) -> bool {
        self.roster.contains(&agent)
    }

    /// Number of observers with a view.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.views.len()
    }
}

/// Area a natural target must stand in to be considered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThreatScope {
    /// Any candidate qualifies
    Anywhere,
    /// Only candidates within `radius` of `center`
    Around {
        /// Center of the guarded area
        center: Vec3,
        /// Threat radius
        radius: f32,
    },
}

impl ThreatScope {
    /// Scope of a behavior state. Defenders only consider threats near
    /// what they defend, `margin` past the outer radius.
    #[must_use]
    pub fn for_state(state: &BehaviorState, margin: f32) -> Self {
        match state {
            BehaviorState::DefendLocation { center, max_radius, .. } => Self::Around {
                center: *center,
                radius: max_radius + margin,
            },
            _ => Self::Anywhere,
        }
    }

    /// Whether a candidate at `pos` is in scope.
    #[must_use]
    pub fn admits(&self, pos: Vec3) -> bool {
        match *self {
            Self::Anywhere => true,
            Self::Around { center, radius } => pos.distance(center) <= radius,
        }
    }
}

/// Outcome of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Resolved target
    pub target: Option<AgentId>,
    /// Whether it is the forced target
    pub forced: bool,
}

/// Picks combat targets from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetResolver {
    retarget_interval: f64,
    tie_break: TieBreak,
    threat_margin: f32,
}

impl TargetResolver {
    /// Creates a resolver from the targeting policy in `config`.
    #[must_use]
    pub fn new(config: &AiConfig) -> Self {
        Self {
            retarget_interval: config.retarget_interval,
            tie_break: config.tie_break,
            threat_margin: config.defend_threat_margin,
        }
    }

    /// Nearest visible hostile in `view` and `scope`, ties broken by the
    /// policy and finally by lowest id.
    #[must_use]
    pub fn select_natural(&self, view: &ObserverView, scope: ThreatScope) -> Option<AgentId> {
        view.candidates()
            .iter()
            .filter(|c| c.hostile && c.visible && scope.admits(c.position))
            .min_by(|a, b| self.compare(a, b))
            .map(|c| c.id)
    }

    fn compare(&self, a: &TargetCandidate, b: &TargetCandidate) -> Ordering {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| match self.tie_break {
                TieBreak::LowestHealthThenId => a.health.total_cmp(&b.health),
                TieBreak::LowestId => Ordering::Equal,
            })
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Resolves the agent's target for this tick and updates its cache.
    ///
    /// A forced target present in the agent's view wins without touching the
    /// throttle. Otherwise the natural pick is refreshed when the retarget
    /// interval has elapsed or the cached pick stopped being valid.
    pub fn resolve(&self, agent: &mut Agent, snapshot: &VisibilitySnapshot, now: f64) -> Resolution {
        let Some(view) = snapshot.view(agent.id()) else {
            // Own position unreadable: keep last tick's answer.
            return Resolution {
                target: agent.targeting.current,
                forced: agent.targeting.current.is_some() && agent.targeting.current == agent.forced_target,
            };
        };

        if let Some(forced) = agent.forced_target {
            // A degraded view may be missing the forced target for this tick only.
            let present = view.candidate(forced).is_some();
            if present || (view.is_degraded() && snapshot.is_alive(forced)) {
                agent.targeting.current = Some(forced);
                return Resolution {
                    target: Some(forced),
                    forced: true,
                };
            }
        }

        if !agent.targeting_enabled || !agent.state.seeks_targets() {
            let targeting = &mut agent.targeting;
            targeting.natural = None;
            targeting.current = None;
            targeting.expire();
            return Resolution::default();
        }

        let scope = ThreatScope::for_state(&agent.state, self.threat_margin);
        let targeting = &mut agent.targeting;
        let qualifies = |c: &TargetCandidate| c.hostile && c.visible && scope.admits(c.position);
        let due = now >= targeting.next_natural_at;
        let cached_invalid = targeting
            .natural
            .is_some_and(|id| !view.candidate(id).is_some_and(qualifies));

        if due || cached_invalid {
            let retained = view.is_degraded()
                && targeting
                    .natural
                    .is_some_and(|id| snapshot.is_alive(id) && view.candidate(id).map_or(true, qualifies));
            if !retained {
                targeting.natural = self.select_natural(view, scope);
            }
            if due {
                targeting.next_natural_at = now + self.retarget_interval;
            }
        }

        targeting.current = targeting.natural;
        Resolution {
            target: targeting.natural,
            forced: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorState;
    use proptest::prelude::*;

    fn candidate(id: u32, distance: f32, health: f32) -> TargetCandidate {
        TargetCandidate {
            id: AgentId::new(id),
            position: Vec3::new(distance, 0.0, 0.0),
            distance,
            visible: true,
            health,
            hostile: true,
        }
    }

    fn fighter(id: u32) -> Agent {
        let mut agent = Agent::new(AgentId::new(id), TeamId::new(1), Vec3::ZERO);
        agent.state = BehaviorState::BattlefieldAI;
        agent
    }

    fn snapshot_for(observer: u32, candidates: Vec<TargetCandidate>, degraded: bool) -> VisibilitySnapshot {
        let mut views = vec![(
            AgentId::new(observer),
            ObserverView::new(Vec3::ZERO, candidates.clone(), degraded),
        )];
        for c in candidates {
            views.push((c.id, ObserverView::new(Vec3::ZERO, Vec::new(), false)));
        }
        VisibilitySnapshot::from_views(0, views)
    }

    #[test]
    fn test_nearest_visible_hostile() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut hidden = candidate(2, 1.0, 10.0);
        hidden.visible = false;
        let mut friend = candidate(3, 2.0, 10.0);
        friend.hostile = false;
        let view = ObserverView::new(
            Vec3::ZERO,
            vec![hidden, friend, candidate(4, 8.0, 90.0), candidate(5, 5.0, 90.0)],
            false,
        );
        assert_eq!(resolver.select_natural(&view, ThreatScope::Anywhere), Some(AgentId::new(5)));
    }

    #[test]
    fn test_tie_breaks_by_health_then_id() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let view = ObserverView::new(
            Vec3::ZERO,
            vec![candidate(9, 5.0, 40.0), candidate(7, 5.0, 80.0), candidate(8, 5.0, 40.0)],
            false,
        );
        assert_eq!(resolver.select_natural(&view, ThreatScope::Anywhere), Some(AgentId::new(8)));

        let config = AiConfig {
            tie_break: TieBreak::LowestId,
            ..AiConfig::default()
        };
        let resolver = TargetResolver::new(&config);
        assert_eq!(resolver.select_natural(&view, ThreatScope::Anywhere), Some(AgentId::new(7)));
    }

    #[test]
    fn test_forced_target_wins_when_present() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);
        agent.forced_target = Some(AgentId::new(3));
        let mut far = candidate(3, 50.0, 100.0);
        far.visible = false;
        let snapshot = snapshot_for(1, vec![candidate(2, 1.0, 100.0), far], false);

        let resolution = resolver.resolve(&mut agent, &snapshot, 0.1);
        assert_eq!(resolution.target, Some(AgentId::new(3)));
        assert!(resolution.forced);
    }

    #[test]
    fn test_missing_forced_target_falls_back_to_natural() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);
        agent.forced_target = Some(AgentId::new(99));
        let snapshot = snapshot_for(1, vec![candidate(2, 3.0, 100.0)], false);

        let resolution = resolver.resolve(&mut agent, &snapshot, 0.1);
        assert_eq!(resolution.target, Some(AgentId::new(2)));
        assert!(!resolution.forced);
    }

    #[test]
    fn test_natural_resolution_is_throttled() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);

        let first = snapshot_for(1, vec![candidate(2, 10.0, 100.0), candidate(3, 20.0, 100.0)], false);
        assert_eq!(resolver.resolve(&mut agent, &first, 0.0).target, Some(AgentId::new(2)));

        // 3 walks closer, but the cached pick stays valid until the interval passes.
        let closer = snapshot_for(1, vec![candidate(2, 10.0, 100.0), candidate(3, 1.0, 100.0)], false);
        assert_eq!(resolver.resolve(&mut agent, &closer, 0.25).target, Some(AgentId::new(2)));
        assert_eq!(resolver.resolve(&mut agent, &closer, 0.5).target, Some(AgentId::new(3)));
    }

    #[test]
    fn test_invalid_cached_target_bypasses_throttle() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);

        let first = snapshot_for(1, vec![candidate(2, 10.0, 100.0), candidate(3, 20.0, 100.0)], false);
        resolver.resolve(&mut agent, &first, 0.0);

        let gone = snapshot_for(1, vec![candidate(3, 20.0, 100.0)], false);
        assert_eq!(resolver.resolve(&mut agent, &gone, 0.1).target, Some(AgentId::new(3)));
    }

    #[test]
    fn test_degraded_view_retains_previous_pick() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);

        let first = snapshot_for(1, vec![candidate(2, 10.0, 100.0), candidate(3, 20.0, 100.0)], false);
        resolver.resolve(&mut agent, &first, 0.0);

        // Candidate 2's data failed this tick: it is alive but missing from the view.
        let mut views = vec![
            (
                AgentId::new(1),
                ObserverView::new(Vec3::ZERO, vec![candidate(3, 20.0, 100.0)], true),
            ),
            (AgentId::new(3), ObserverView::new(Vec3::ZERO, Vec::new(), false)),
        ];
        views.push((AgentId::new(2), ObserverView::new(Vec3::ZERO, Vec::new(), false)));
        let degraded = VisibilitySnapshot::from_views(1, views);

        assert_eq!(resolver.resolve(&mut agent, &degraded, 0.6).target, Some(AgentId::new(2)));
    }

    #[test]
    fn test_degraded_view_keeps_forced_target() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);
        agent.forced_target = Some(AgentId::new(3));

        // Forced target 3 is alive but its data failed this tick.
        let views = vec![
            (
                AgentId::new(1),
                ObserverView::new(Vec3::ZERO, vec![candidate(2, 5.0, 100.0)], true),
            ),
            (AgentId::new(2), ObserverView::new(Vec3::ZERO, Vec::new(), false)),
            (AgentId::new(3), ObserverView::new(Vec3::ZERO, Vec::new(), false)),
        ];
        let degraded = VisibilitySnapshot::from_views(1, views);

        let resolution = resolver.resolve(&mut agent, &degraded, 0.0);
        assert_eq!(resolution.target, Some(AgentId::new(3)));
        assert!(resolution.forced);

        // Gone from the roster: the forced target no longer holds.
        let views = vec![
            (
                AgentId::new(1),
                ObserverView::new(Vec3::ZERO, vec![candidate(2, 5.0, 100.0)], true),
            ),
            (AgentId::new(2), ObserverView::new(Vec3::ZERO, Vec::new(), false)),
        ];
        let without = VisibilitySnapshot::from_views(2, views);
        let resolution = resolver.resolve(&mut agent, &without, 0.1);
        assert_eq!(resolution.target, Some(AgentId::new(2)));
        assert!(!resolution.forced);
    }

    #[test]
    fn test_defender_scope_limits_candidates() {
        let config = AiConfig::default();
        let resolver = TargetResolver::new(&config);
        let mut agent = fighter(1);
        agent.state = BehaviorState::defend(Vec3::ZERO, 2.0, 10.0);

        let mut outside = candidate(2, 12.0, 100.0);
        outside.position = Vec3::new(22.0, 0.0, 0.0);
        let mut inside = candidate(3, 25.0, 100.0);
        inside.position = Vec3::new(-15.0, 0.0, 0.0);
        let snapshot = snapshot_for(1, vec![outside, inside], false);

        let scope = ThreatScope::for_state(agent.state(), config.defend_threat_margin);
        assert!(!scope.admits(outside.position));
        assert!(scope.admits(inside.position));
        assert_eq!(resolver.resolve(&mut agent, &snapshot, 0.0).target, Some(AgentId::new(3)));

        // Out of scope only: nothing to engage.
        let snapshot = snapshot_for(1, vec![outside], false);
        assert_eq!(resolver.resolve(&mut agent, &snapshot, 0.1).target, None);
    }

    #[test]
    fn test_non_seeking_state_ignores_natural_targets() {
        let resolver = TargetResolver::new(&AiConfig::default());
        let mut agent = fighter(1);
        agent.state = BehaviorState::Idle;
        let snapshot = snapshot_for(1, vec![candidate(2, 1.0, 100.0)], false);

        assert_eq!(resolver.resolve(&mut agent, &snapshot, 0.0).target, None);

        agent.targeting_enabled = false;
        agent.state = BehaviorState::BattlefieldAI;
        assert_eq!(resolver.resolve(&mut agent, &snapshot, 0.0).target, None);
    }

    #[test]
    fn test_capture_drops_unavailable_candidates() {
        use crate::world::SandboxWorld;

        let mut world = SandboxWorld::new();
        let blue = TeamId::new(1);
        let red = TeamId::new(2);
        let (a, b, c) = (AgentId::new(1), AgentId::new(2), AgentId::new(3));
        world.place(a, Vec3::ZERO, 100.0);
        world.place(b, Vec3::new(5.0, 0.0, 0.0), 100.0);
        world.place(c, Vec3::new(500.0, 0.0, 0.0), 100.0);
        world.set_unavailable(b, true);

        let roster = [(a, blue), (b, red), (c, red)];
        let snapshot = VisibilitySnapshot::capture(7, &roster, &world, 150.0);

        let view = snapshot.view(a).expect("observer view");
        assert!(view.is_degraded());
        assert!(view.candidate(b).is_none());
        let far = view.candidate(c).expect("far candidate");
        assert!(!far.visible);
        assert!(snapshot.view(b).is_none());
        assert!(snapshot.is_alive(b));
        assert_eq!(snapshot.tick(), 7);
    }

    fn arb_candidates() -> impl Strategy<Value = Vec<TargetCandidate>> {
        prop::collection::vec(
            (2u32..40, 0u8..6, 0u8..4, any::<bool>(), any::<bool>()),
            0..16,
        )
        .prop_map(|raw| {
            let mut seen = std::collections::BTreeSet::new();
            raw.into_iter()
                .filter(|(id, ..)| seen.insert(*id))
                .map(|(id, dist, hp, visible, hostile)| TargetCandidate {
                    id: AgentId::new(id),
                    position: Vec3::new(f32::from(dist) * 5.0, 0.0, 0.0),
                    distance: f32::from(dist) * 5.0,
                    visible,
                    health: f32::from(hp) * 25.0,
                    hostile,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn natural_selection_is_deterministic(candidates in arb_candidates()) {
            let resolver = TargetResolver::new(&AiConfig::default());
            let forward = ObserverView::new(Vec3::ZERO, candidates.clone(), false);
            let mut reversed = candidates.clone();
            reversed.reverse();
            let backward = ObserverView::new(Vec3::ZERO, reversed, false);

            let pick = resolver.select_natural(&forward, ThreatScope::Anywhere);
            prop_assert_eq!(pick, resolver.select_natural(&forward, ThreatScope::Anywhere));
            prop_assert_eq!(pick, resolver.select_natural(&backward, ThreatScope::Anywhere));

            if let Some(id) = pick {
                let chosen = forward.candidate(id).copied().expect("chosen candidate in view");
                for c in forward.candidates().iter().filter(|c| c.hostile && c.visible) {
                    prop_assert!(chosen.distance <= c.distance);
                    if c.distance == chosen.distance {
                        prop_assert!(chosen.health < c.health || (chosen.health == c.health && chosen.id <= c.id));
                    }
                }
            } else {
                prop_assert!(!forward.candidates().iter().any(|c| c.hostile && c.visible));
            }
        }

        #[test]
        fn resolve_matches_across_identical_snapshots(candidates in arb_candidates()) {
            let resolver = TargetResolver::new(&AiConfig::default());
            let snapshot = snapshot_for(1, candidates, false);
            let mut first = fighter(1);
            let mut second = fighter(1);
            prop_assert_eq!(
                resolver.resolve(&mut first, &snapshot, 0.0),
                resolver.resolve(&mut second, &snapshot, 0.0)
            );
        }
    }
}
