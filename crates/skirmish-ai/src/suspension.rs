//! Resumable continuations attached to agents.
//!
//! A suspension is plain data: a wake rule plus the continuation to run when
//! it wakes. The scheduler re-evaluates it every tick against simulated
//! time. Cancelling means dropping the record, so a cancelled wait has
//! nothing left that could fire later.

use serde::{Deserialize, Serialize};
use skirmish_common::Vec3;

use crate::behavior::BehaviorState;

/// Condition re-evaluated every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaitCondition {
    /// Current move or descent reached its destination
    Arrived,
    /// A target is resolved
    HasTarget,
    /// No target is resolved
    NoTarget,
    /// Agent is within `radius` of `point`
    WithinDistanceOf {
        /// Reference point
        point: Vec3,
        /// Radius
        radius: f32,
    },
}

/// When a suspension wakes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Wake {
    /// At or after this simulated time (seconds)
    At(f64),
    /// As soon as the condition holds
    Until(WaitCondition),
}

/// What runs when a suspension wakes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Continuation {
    /// End forced fire
    StopForcedFire,
    /// Switch behavior (through the regular `set_behavior` path)
    SetBehavior(BehaviorState),
    /// Drop the forced target
    ClearTarget,
    /// Publish a labelled notification
    Notify(String),
}

/// Agent facts a wake rule is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeContext {
    /// Current simulated time
    pub now: f64,
    /// Whether the agent signalled arrival on its last tick
    pub arrived: bool,
    /// Whether the agent has a resolved target
    pub has_target: bool,
    /// Agent position, if the world could report it
    pub position: Option<Vec3>,
}

/// A pending wait and its continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    /// Wake rule
    pub wake: Wake,
    /// Continuation to run on wake
    pub continuation: Continuation,
}

impl Suspension {
    /// Wakes at an absolute simulated time.
    #[must_use]
    pub fn at(time: f64, continuation: Continuation) -> Self {
        Self {
            wake: Wake::At(time),
            continuation,
        }
    }

    /// Wakes once `condition` holds.
    #[must_use]
    pub fn until(condition: WaitCondition, continuation: Continuation) -> Self {
        Self {
            wake: Wake::Until(condition),
            continuation,
        }
    }

    /// Whether the suspension is due.
    #[must_use]
    pub fn is_due(&self, ctx: &WakeContext) -> bool {
        match self.wake {
            Wake::At(time) => ctx.now >= time,
            Wake::Until(WaitCondition::Arrived) => ctx.arrived,
            Wake::Until(WaitCondition::HasTarget) => ctx.has_target,
            Wake::Until(WaitCondition::NoTarget) => !ctx.has_target,
            Wake::Until(WaitCondition::WithinDistanceOf { point, radius }) => ctx
                .position
                .is_some_and(|pos| pos.distance(point) <= radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(now: f64) -> WakeContext {
        WakeContext {
            now,
            arrived: false,
            has_target: false,
            position: None,
        }
    }

    #[test]
    fn test_timed_wake() {
        let s = Suspension::at(3.0, Continuation::StopForcedFire);
        assert!(!s.is_due(&ctx(2.99)));
        assert!(s.is_due(&ctx(3.0)));
    }

    #[test]
    fn test_condition_wake() {
        let s = Suspension::until(WaitCondition::Arrived, Continuation::Notify("here".into()));
        let mut c = ctx(0.0);
        assert!(!s.is_due(&c));
        c.arrived = true;
        assert!(s.is_due(&c));

        let no_target = Suspension::until(WaitCondition::NoTarget, Continuation::ClearTarget);
        assert!(no_target.is_due(&ctx(0.0)));
    }

    #[test]
    fn test_distance_wake_needs_position() {
        let s = Suspension::until(
            WaitCondition::WithinDistanceOf {
                point: Vec3::ZERO,
                radius: 2.0,
            },
            Continuation::SetBehavior(BehaviorState::Idle),
        );
        let mut c = ctx(0.0);
        assert!(!s.is_due(&c));
        c.position = Some(Vec3::new(1.0, 0.0, 1.0));
        assert!(s.is_due(&c));
        c.position = Some(Vec3::new(5.0, 0.0, 0.0));
        assert!(!s.is_due(&c));
    }
}
