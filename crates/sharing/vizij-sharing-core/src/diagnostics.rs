//! Per-frame counters and debug snapshots.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

use crate::ids::{ActorHandle, ActorId, ComponentId, StateId};

/// Counters gathered after each tick, summed over schedulers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingStats {
    pub actors: usize,
    pub components: usize,
    pub blends: usize,
    pub on_demands: usize,
    pub additives: usize,
    /// States with at least one slot in use at the end of the tick.
    pub running_states: usize,
    /// Slots in use at the end of the tick.
    pub running_slots: usize,
}

impl AddAssign for SharingStats {
    fn add_assign(&mut self, rhs: Self) {
        self.actors += rhs.actors;
        self.components += rhs.components;
        self.blends += rhs.blends;
        self.on_demands += rhs.on_demands;
        self.additives += rhs.additives;
        self.running_states += rhs.running_states;
        self.running_slots += rhs.running_slots;
    }
}

/// Snapshot of one actor, as shown by the debug overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorDebugState {
    pub actor: ActorId,
    pub handle: ActorHandle,
    pub state: StateId,
    pub previous_state: StateId,
    pub permutation: usize,
    pub significance: f32,
    pub blending: bool,
    pub on_demand: bool,
    pub additive: bool,
    /// Leader of the actor's first component.
    pub leader: Option<ComponentId>,
    pub label: String,
}

/// Per-slot bits, reported at debug level 2.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDebugState {
    pub state: StateId,
    pub slot: usize,
    pub component: ComponentId,
    pub in_use: bool,
    pub tick_required: bool,
}
