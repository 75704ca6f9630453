//! Notification bus for AI events.
//!
//! Fire-and-forget: the core publishes and never waits on a consumer. The
//! notification/UI layer drains the bus whenever it likes.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use skirmish_common::{AgentId, SquadId, Vec3};

use crate::behavior::BehaviorKind;

/// Events published by the AI core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiEvent {
    /// Agent registered from a spawn event
    AgentRegistered {
        /// Agent ID
        agent: AgentId,
    },
    /// Agent marked dead
    AgentDied {
        /// Agent ID
        agent: AgentId,
    },
    /// Agent removed from the registry
    AgentRemoved {
        /// Agent ID
        agent: AgentId,
    },
    /// Exit actions of a state ran
    BehaviorExited {
        /// Agent ID
        agent: AgentId,
        /// State left
        kind: BehaviorKind,
    },
    /// Entry actions of a state ran
    BehaviorEntered {
        /// Agent ID
        agent: AgentId,
        /// State entered
        kind: BehaviorKind,
    },
    /// Move destination reached
    Arrived {
        /// Agent ID
        agent: AgentId,
        /// Destination
        destination: Vec3,
    },
    /// Patrol waypoint reached
    WaypointReached {
        /// Agent ID
        agent: AgentId,
        /// Index of the waypoint reached
        index: usize,
    },
    /// Non-looping patrol finished its last waypoint
    PatrolCompleted {
        /// Agent ID
        agent: AgentId,
    },
    /// Parachute touched down
    Landed {
        /// Agent ID
        agent: AgentId,
        /// Landing zone
        landing_zone: Vec3,
    },
    /// Defender entered its ring
    HoldingPosition {
        /// Agent ID
        agent: AgentId,
    },
    /// Resolved target changed to a new agent
    TargetAcquired {
        /// Agent ID
        agent: AgentId,
        /// New target
        target: AgentId,
        /// Whether the target was forced
        forced: bool,
    },
    /// Resolved target went away
    TargetLost {
        /// Agent ID
        agent: AgentId,
        /// Previous target
        previous: AgentId,
    },
    /// Forced fire started
    ForcedFireStarted {
        /// Agent ID
        agent: AgentId,
        /// Duration in simulated seconds
        duration: f64,
    },
    /// Forced fire stopped
    ForcedFireStopped {
        /// Agent ID
        agent: AgentId,
    },
    /// Pending suspension discarded before it woke
    SuspensionCancelled {
        /// Agent ID
        agent: AgentId,
    },
    /// Pending suspension woke and ran its continuation
    SuspensionResumed {
        /// Agent ID
        agent: AgentId,
    },
    /// Designer-labelled notification raised by a continuation
    Notify {
        /// Agent ID
        agent: AgentId,
        /// Label given by the caller
        label: String,
    },
    /// Agent faulted during its tick and fell back to idle
    AgentFaulted {
        /// Agent ID
        agent: AgentId,
        /// Fault description
        reason: String,
    },
    /// Squad formed
    SquadCreated {
        /// Squad ID
        squad: SquadId,
        /// Leader
        leader: AgentId,
    },
    /// Squad leader replaced after the old one died
    LeaderPromoted {
        /// Squad ID
        squad: SquadId,
        /// Old leader
        previous: AgentId,
        /// New leader
        leader: AgentId,
    },
    /// Escort rebound to a new protected agent
    EscortRebound {
        /// Agent ID
        agent: AgentId,
        /// Previously protected agent
        from: AgentId,
        /// Newly protected agent
        to: AgentId,
    },
    /// Squad dissolved
    SquadDisbanded {
        /// Squad ID
        squad: SquadId,
    },
}

impl AiEvent {
    /// Agent the event concerns, if any.
    #[must_use]
    pub const fn agent(&self) -> Option<AgentId> {
        match self {
            Self::AgentRegistered { agent }
            | Self::AgentDied { agent }
            | Self::AgentRemoved { agent }
            | Self::BehaviorExited { agent, .. }
            | Self::BehaviorEntered { agent, .. }
            | Self::Arrived { agent, .. }
            | Self::WaypointReached { agent, .. }
            | Self::PatrolCompleted { agent }
            | Self::Landed { agent, .. }
            | Self::HoldingPosition { agent }
            | Self::TargetAcquired { agent, .. }
            | Self::TargetLost { agent, .. }
            | Self::ForcedFireStarted { agent, .. }
            | Self::ForcedFireStopped { agent }
            | Self::SuspensionCancelled { agent }
            | Self::SuspensionResumed { agent }
            | Self::Notify { agent, .. }
            | Self::AgentFaulted { agent, .. }
            | Self::EscortRebound { agent, .. } => Some(*agent),
            Self::SquadCreated { leader, .. } | Self::LeaderPromoted { leader, .. } => Some(*leader),
            Self::SquadDisbanded { .. } => None,
        }
    }
}

/// Event bus for broadcasting AI events to the notification layer.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<AiEvent>,
    /// Receiver for collecting events
    receiver: Receiver<AiEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: AiEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<AiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new receiver handle for a consumer on another thread.
    #[must_use]
    pub fn subscriber(&self) -> Receiver<AiEvent> {
        self.receiver.clone()
    }
}
