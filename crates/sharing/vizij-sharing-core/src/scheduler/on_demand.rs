//! One-shot clip runs on dedicated slots.

use log::{debug, warn};

use super::SharingScheduler;
use crate::host::ComponentHost;
use crate::ids::StateId;
use crate::instances::{remove_from_cohort, OnDemandInstance};

impl SharingScheduler {
    /// Stage 2: keep runs alive, start their blend out, and hand actors on when they end.
    pub(super) fn tick_on_demand_instances(&mut self, host: &mut dyn ComponentHost) {
        let now = self.world_time;
        let mut i = 0;
        while i < self.on_demands.len() {
            let (state, slot) = (self.on_demands[i].state, self.on_demands[i].slot);
            self.catalog.set_in_use(state, slot, true);
            if self.any_requires_tick(&self.on_demands[i].actors) {
                self.catalog.set_tick_required(state, slot);
            }

            if self.on_demands[i].end_time <= now {
                self.catalog.set_in_use(state, slot, false);
                self.finish_on_demand(host, i);
                continue;
            }

            let run = &self.on_demands[i];
            if !run.blend_active && run.start_blend_time <= now {
                self.blend_out_of_on_demand(host, i);
            }
            i += 1;
        }
    }

    /// Blend every cohort member out towards the state it will land in.
    fn blend_out_of_on_demand(&mut self, host: &mut dyn ComponentHost, index: usize) {
        let run = &self.on_demands[index];
        let (run_state, return_to_previous, forward_to) = (run.state, run.return_to_previous, run.forward_to);
        let cohort = run.actors.clone();

        for a in cohort {
            let should_blend = self.should_blend(a);
            let target = match self.actors.get(a) {
                Some(data) if should_blend => {
                    if return_to_previous {
                        Some(data.previous_state)
                    } else if forward_to.is_some() {
                        forward_to
                    } else if data.current_state != run_state {
                        Some(data.current_state)
                    } else {
                        None
                    }
                }
                _ => None,
            };
            if let Some(to) = target {
                if let Some(blend) = self.setup_blend_from_on_demand(host, to, index, a) {
                    self.on_demands[index].blend_to_permutation = Some(self.blends[blend].to_permutation);
                }
            }
            self.on_demands[index].blend_active |= should_blend;
        }
    }

    /// Remove a finished run and move each of its actors to the next state.
    fn finish_on_demand(&mut self, host: &mut dyn ComponentHost, index: usize) {
        // removing first clears every back-reference to this run, so the
        // follow-up state can never land back on it
        let finished = self.remove_on_demand_instance(index);
        debug!(
            "sharing: on-demand {} slot {} finished for {:?}",
            finished.state, finished.slot, finished.actors
        );

        for &a in &finished.actors {
            if let Some(data) = self.actors.get_mut(a) {
                if data.on_demand_instance.is_none() {
                    data.running_on_demand = false;
                    data.blending = data.blend_instance.is_some();
                }
            }
        }

        for &a in &finished.actors {
            let Some(data) = self.actors.get(a) else {
                continue;
            };
            let current = data.current_state;
            let next = if finished.return_to_previous {
                Some(data.previous_state)
            } else if finished.forward_to.is_some() {
                finished.forward_to
            } else if current != finished.state
                && (!self.catalog.is_on_demand(current) || !finished.blend_active)
            {
                Some(current)
            } else {
                None
            };
            if let Some(next) = next {
                self.set_actor_state(host, a, next, finished.blend_to_permutation);
            }
        }
    }

    /// Land an actor leaving a finished run in `state`.
    fn set_actor_state(
        &mut self,
        host: &mut dyn ComponentHost,
        actor: usize,
        state: StateId,
        blend_to_permutation: Option<usize>,
    ) {
        let on_demand = self.catalog.is_on_demand(state);
        let has_slots = self.catalog.slot_count(state) > 0;
        match blend_to_permutation {
            Some(permutation) if !on_demand && has_slots => self.set_permutation(host, state, actor, permutation),
            _ => {
                self.setup_follower(host, state, actor);
                if on_demand {
                    let now = self.world_time;
                    let run = self.actors.get(actor).and_then(|d| d.on_demand_instance);
                    if let Some(run) = run.and_then(|r| self.on_demands.get_mut(r)) {
                        if !run.active {
                            run.active = true;
                            run.start_time = now;
                        }
                    }
                }
            }
        }
        self.relabel(actor, state);
    }

    /// Find a run of `state` an actor can join.
    ///
    /// In order: the run already started for this state this frame, a new run
    /// on a free slot, or an older run to piggyback on.
    pub(super) fn setup_on_demand_instance(&mut self, host: &mut dyn ComponentHost, state: StateId) -> Option<usize> {
        let info = self.catalog.get(state)?;
        if let Some(index) = info.current_frame_on_demand.filter(|&i| i < self.on_demands.len()) {
            return Some(index);
        }
        if info.slots.is_empty() {
            return None;
        }

        let free = (0..info.slots.len()).find(|&slot| {
            !info.slots[slot].in_use
                && !self
                    .on_demands
                    .iter()
                    .any(|run| run.state == state && run.slot == slot)
        });

        if let Some(slot) = free {
            let clip_length = info.slots[slot].clip_length;
            let component = info.slots[slot].component;
            let end_time = self.world_time + clip_length;
            let run = OnDemandInstance {
                active: false,
                blend_active: false,
                state,
                slot,
                start_time: 0.0,
                end_time,
                start_blend_time: end_time - info.blend_time,
                return_to_previous: info.return_to_previous,
                forward_to: info.forward_to,
                blend_to_permutation: None,
                actors: Vec::new(),
            };
            self.catalog.set_in_use(state, slot, true);
            self.on_demands.push(run);
            let index = self.on_demands.len() - 1;
            if let Some(info) = self.catalog.get_mut(state) {
                info.current_frame_on_demand = Some(index);
            }
            host.set_tick_enabled(component, true);
            host.restart_clip(component);
            debug!("sharing: on-demand {} started on slot {}", state, slot);
            return Some(index);
        }

        // every slot is busy: join the oldest run that has played past the wiggle window
        let max_start = self.world_time - info.wiggle_time;
        let mut wiggle: Option<(usize, f32)> = None;
        let mut earliest: Option<(usize, f32)> = None;
        for (index, run) in self.on_demands.iter().enumerate() {
            if run.state != state {
                continue;
            }
            if run.start_time <= max_start && wiggle.map_or(true, |(_, t)| run.start_time < t) {
                wiggle = Some((index, run.start_time));
            }
            if earliest.map_or(true, |(_, t)| run.start_time < t) {
                earliest = Some((index, run.start_time));
            }
        }
        let stolen = wiggle.or(earliest).map(|(index, _)| index);
        if stolen.is_none() {
            warn!("sharing: no more on-demand slots available for state {}", self.state_name(state));
        }
        stolen
    }

    /// Take an actor out of its run's cohort. The back-reference is kept.
    pub(super) fn remove_from_current_on_demand(&mut self, actor: usize) {
        let Some(data) = self.actors.get(actor) else {
            return;
        };
        if !data.running_on_demand {
            return;
        }
        if let Some(run) = data.on_demand_instance.and_then(|i| self.on_demands.get_mut(i)) {
            remove_from_cohort(&mut run.actors, actor);
        }
    }

    /// Hard switch between runs: follow the new run's slot from its current frame.
    pub(super) fn switch_between_on_demands(
        &mut self,
        host: &mut dyn ComponentHost,
        from: Option<usize>,
        to: usize,
        actor: usize,
    ) {
        if let Some(run) = from.and_then(|i| self.on_demands.get_mut(i)) {
            remove_from_cohort(&mut run.actors, actor);
        }
        if let Some(data) = self.actors.get_mut(actor) {
            data.permutation = 0;
        }
        let Some(run) = self.on_demands.get(to) else {
            return;
        };
        if let Some(slot) = self.catalog.slot_component(run.state, run.slot) {
            self.set_leader_for_actor(host, actor, slot);
        }
    }
}
