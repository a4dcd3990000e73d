//! Per-actor rows and in-flight transition records.
//!
//! All cross references are dense indices into the owning scheduler's arrays.
//! Removal is swap-remove followed by an explicit fixup of every reference to
//! the relocated element.

use std::fmt;

use crate::ids::{ActorHandle, ActorId, ComponentId, StateId};
use crate::pool::PoolHandle;

/// Callback told about an actor's handle on registration and renumbering.
pub struct HandleCallback(Box<dyn FnMut(ActorHandle)>);

impl HandleCallback {
    pub fn new(callback: impl FnMut(ActorHandle) + 'static) -> Self {
        Self(Box::new(callback))
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    #[inline]
    pub fn call(&mut self, handle: ActorHandle) {
        (self.0)(handle)
    }
}

impl fmt::Debug for HandleCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandleCallback")
    }
}

/// Runtime row of one registered actor.
#[derive(Debug)]
pub struct ActorData {
    pub actor: ActorId,
    pub current_state: StateId,
    pub previous_state: StateId,
    /// Slot within `current_state` the actor follows.
    pub permutation: usize,
    pub significance: f32,
    pub blending: bool,
    pub running_on_demand: bool,
    pub running_additive: bool,
    pub requires_tick: bool,
    pub blend_instance: Option<usize>,
    pub on_demand_instance: Option<usize>,
    pub additive_instance: Option<usize>,
    /// Indices into the scheduler's component rows.
    pub components: Vec<usize>,
    pub(crate) on_handle: HandleCallback,
}

impl ActorData {
    pub(crate) fn new(actor: ActorId, state: StateId, significance: f32, on_handle: HandleCallback) -> Self {
        Self {
            actor,
            current_state: state,
            previous_state: state,
            permutation: 0,
            significance,
            blending: false,
            running_on_demand: false,
            running_additive: false,
            requires_tick: false,
            blend_instance: None,
            on_demand_instance: None,
            additive_instance: None,
            components: Vec::new(),
            on_handle,
        }
    }
}

/// One follower component of an actor.
#[derive(Clone, Debug)]
pub struct ComponentData {
    pub component: ComponentId,
    pub actor: usize,
    /// Component this follower currently copies its pose from.
    pub leader: Option<ComponentId>,
}

/// Transition shared by actors moving between the same slots.
#[derive(Clone, Debug)]
pub struct BlendInstance {
    /// Armed by kickoff; instances created this frame are still open for reuse.
    pub active: bool,
    /// Cohort has been bound to the helper.
    pub started: bool,
    pub from_state: StateId,
    pub to_state: StateId,
    pub from_permutation: usize,
    pub to_permutation: usize,
    pub on_demand: bool,
    pub blend_time: f32,
    pub end_time: f32,
    pub helper: PoolHandle,
    pub actors: Vec<usize>,
    pub from_on_demand: Option<usize>,
    pub to_on_demand: Option<usize>,
}

/// One run of an on-demand clip on a single slot.
#[derive(Clone, Debug)]
pub struct OnDemandInstance {
    pub active: bool,
    /// Blends out of this run have been set up.
    pub blend_active: bool,
    pub state: StateId,
    pub slot: usize,
    pub start_time: f32,
    pub end_time: f32,
    pub start_blend_time: f32,
    pub return_to_previous: bool,
    pub forward_to: Option<StateId>,
    /// Destination slot chosen by the blend out, shared by late finishers.
    pub blend_to_permutation: Option<usize>,
    pub actors: Vec<usize>,
}

/// Additive overlay running for a single actor.
#[derive(Clone, Debug)]
pub struct AdditiveInstance {
    pub active: bool,
    pub state: StateId,
    pub end_time: f32,
    pub base: Option<ComponentId>,
    pub helper: PoolHandle,
    pub actor: Option<usize>,
}

/// Drop every occurrence of `actor` from a cohort.
pub(crate) fn remove_from_cohort(actors: &mut Vec<usize>, actor: usize) {
    actors.retain(|&a| a != actor);
}

/// Rewrite a back-reference after `removed` was swap-removed and `last` moved into it.
#[inline]
pub(crate) fn remap_index(slot: &mut Option<usize>, removed: usize, last: usize) {
    match *slot {
        Some(i) if i == removed => *slot = None,
        Some(i) if i == last => *slot = Some(removed),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn remap_follows_swap_remove() {
        let mut slot = Some(4);
        remap_index(&mut slot, 1, 4);
        assert_eq!(slot, Some(1));

        let mut slot = Some(1);
        remap_index(&mut slot, 1, 4);
        assert_eq!(slot, None);

        let mut slot = Some(2);
        remap_index(&mut slot, 1, 4);
        assert_eq!(slot, Some(2));
    }

    #[test]
    fn cohort_removal_drops_all_occurrences() {
        let mut cohort = vec![3, 1, 3, 2];
        remove_from_cohort(&mut cohort, 3);
        assert_eq!(cohort, vec![1, 2]);
    }

    #[test]
    fn handle_callback_invokes_closure() {
        let seen = Rc::new(Cell::new(0u32));
        let sink = seen.clone();
        let mut cb = HandleCallback::new(move |h| sink.set(h.raw()));
        cb.call(ActorHandle::new(1, 2));
        assert_eq!(seen.get(), 0x0100_0002);
    }
}
