//! # Skirmish AI
//!
//! Agent behavior core for the Skirmish shooter.
//!
//! This crate drives AI combatants on a fixed tick:
//! - Behavior state machine (idle, move, defend, escort, patrol, parachute, battlefield)
//! - Target resolution over a per-tick visibility snapshot
//! - Squads with formation following, escorts and leader succession
//! - Difficulty profiles
//! - Cancellable suspensions owned by the scheduler
//! - Event bus for the notification layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod behavior;
pub mod combat;
pub mod config;
pub mod controller;
pub mod difficulty;
pub mod edge;
pub mod events;
pub mod scheduler;
pub mod squad;
pub mod suspension;
pub mod targeting;
pub mod world;


/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agent::*;
    pub use crate::behavior::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::controller::*;
    pub use crate::difficulty::*;
    pub use crate::edge::*;
    pub use crate::events::*;
    pub use crate::scheduler::*;
    pub use crate::squad::*;
    pub use crate::suspension::*;
    pub use crate::targeting::*;
    pub use crate::world::*;
}

pub use prelude::*;
