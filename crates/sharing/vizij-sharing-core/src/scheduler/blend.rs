//! Blend transitions between slots.

use log::{debug, warn};

use super::SharingScheduler;
use crate::host::ComponentHost;
use crate::ids::StateId;
use crate::instances::{remove_from_cohort, BlendInstance};
use crate::pool::PoolHandle;

impl SharingScheduler {
    /// Stage 1: finish expired blends and keep running ones fed.
    pub(super) fn tick_blend_instances(&mut self, host: &mut dyn ComponentHost) {
        let now = self.world_time;
        let mut i = 0;
        while i < self.blends.len() {
            if self.blends[i].end_time <= now {
                self.finish_blend(host, i);
                continue;
            }

            if !self.blends[i].started {
                if let Some(helper) = self.blend_pool.get(self.blends[i].helper).map(|h| h.component()) {
                    let cohort = self.blends[i].actors.clone();
                    for a in cohort {
                        self.set_leader_for_actor(host, a, helper);
                    }
                }
                self.blends[i].started = true;
            }

            let blend = &self.blends[i];
            let requires_tick = self.any_requires_tick(&blend.actors);
            for (state, permutation) in [
                (blend.from_state, blend.from_permutation),
                (blend.to_state, blend.to_permutation),
            ] {
                if self.catalog.is_on_demand(state) {
                    continue;
                }
                self.catalog.set_in_use(state, permutation, true);
                if requires_tick {
                    self.catalog.set_tick_required(state, permutation);
                }
            }
            i += 1;
        }
    }

    /// Rebind the cohort off the helper, free it and drop the instance.
    ///
    /// Members still labelled with the destination, or still inside the run
    /// being blended out of, land on the destination slot. Members relabelled
    /// mid-blend go back to the slot of their own state.
    fn finish_blend(&mut self, host: &mut dyn ComponentHost, index: usize) {
        let blend = &mut self.blends[index];
        let cohort = std::mem::take(&mut blend.actors);
        let (from_state, to_state) = (blend.from_state, blend.to_state);
        let (from_permutation, to_permutation) = (blend.from_permutation, blend.to_permutation);
        let (to_on_demand, helper) = (blend.to_on_demand, blend.helper);
        let output = self.blend_pool.get(helper).and_then(|h| h.output_slot());
        let into_run = self.catalog.is_on_demand(to_state);
        let out_of_run = self.catalog.is_on_demand(from_state);

        for &a in &cohort {
            let Some((current, in_run)) = self.actors.get(a).map(|d| (d.current_state, d.running_on_demand)) else {
                continue;
            };
            if into_run {
                match output.filter(|_| to_on_demand.is_some()) {
                    Some(output) => {
                        self.set_leader_for_actor(host, a, output);
                        if let Some(data) = self.actors.get_mut(a) {
                            data.permutation = 0;
                        }
                    }
                    // the destination run already ended and handed its actors on
                    None => self.settle_actor(host, a),
                }
            } else if current == to_state || (out_of_run && in_run) {
                self.set_permutation(host, to_state, a, to_permutation);
            } else if current == from_state {
                self.set_permutation(host, from_state, a, from_permutation);
            } else {
                self.settle_actor(host, a);
            }
        }

        self.free_blend_helper(host, helper);
        for &a in &cohort {
            if let Some(data) = self.actors.get_mut(a) {
                if data.blend_instance == Some(index) {
                    data.blend_instance = None;
                    data.blending = false;
                }
            }
        }
        debug!("sharing: blend {} -> {} finished", from_state, to_state);
        self.remove_blend_instance(index);
    }

    fn free_blend_helper(&mut self, host: &mut dyn ComponentHost, helper: PoolHandle) {
        if let Some(evaluator) = self.blend_pool.get_mut(helper) {
            evaluator.stop(host);
        }
        self.blend_pool.release(helper);
        self.blend_exhaustion_logged = false;
    }

    /// Join or create a blend from `from` to `to` for one actor.
    ///
    /// An instance created this frame with the same endpoints is shared, even
    /// when the helper pool has run dry. Returns `None` when no helper is left,
    /// in which case the caller hard switches.
    pub(super) fn setup_blend(
        &mut self,
        host: &mut dyn ComponentHost,
        from: StateId,
        to: StateId,
        actor: usize,
    ) -> Option<usize> {
        let on_demand = self.catalog.is_on_demand(to);
        if !on_demand && self.catalog.slot_count(to) == 0 {
            return None;
        }
        let permutation = self.actors.get(actor)?.permutation;

        let reuse = self.blends.iter().position(|b| {
            !b.active
                && b.from_state == from
                && b.to_state == to
                && b.on_demand == on_demand
                && b.from_permutation == permutation
        });

        let index = match reuse {
            Some(index) => index,
            None => {
                let Some(helper) = self.blend_pool.try_acquire() else {
                    if !self.blend_exhaustion_logged {
                        warn!(
                            "sharing: no blend helpers left for {}, hard switching {} -> {}",
                            self.skeleton, from, to
                        );
                        self.blend_exhaustion_logged = true;
                    }
                    return None;
                };
                if let Some(evaluator) = self.blend_pool.get(helper) {
                    host.set_tick_enabled(evaluator.component(), true);
                }
                let blend_time = self.catalog.blend_time(to);
                let to_permutation = self.determine_permutation(to);
                self.blends.push(BlendInstance {
                    active: false,
                    started: false,
                    from_state: from,
                    to_state: to,
                    from_permutation: permutation,
                    to_permutation,
                    on_demand,
                    blend_time,
                    end_time: self.world_time + blend_time,
                    helper,
                    actors: Vec::new(),
                    from_on_demand: None,
                    to_on_demand: None,
                });
                self.blends.len() - 1
            }
        };

        // an actor sits in at most one cohort
        if let Some(old) = self.actors[actor].blend_instance.filter(|&old| old != index) {
            if let Some(blend) = self.blends.get_mut(old) {
                remove_from_cohort(&mut blend.actors, actor);
            }
        }
        self.blends[index].actors.push(actor);
        if let Some(data) = self.actors.get_mut(actor) {
            data.blend_instance = Some(index);
            data.blending = !data.running_on_demand;
        }
        Some(index)
    }

    pub(super) fn setup_blend_to_on_demand(
        &mut self,
        host: &mut dyn ComponentHost,
        from: StateId,
        run: usize,
        actor: usize,
    ) -> Option<usize> {
        let to = self.on_demands.get(run)?.state;
        let index = self.setup_blend(host, from, to, actor)?;
        self.blends[index].to_on_demand = Some(run);
        Some(index)
    }

    pub(super) fn setup_blend_from_on_demand(
        &mut self,
        host: &mut dyn ComponentHost,
        to: StateId,
        run: usize,
        actor: usize,
    ) -> Option<usize> {
        let from = self.on_demands.get(run)?.state;
        let index = self.setup_blend(host, from, to, actor)?;
        self.blends[index].from_on_demand = Some(run);
        Some(index)
    }

    pub(super) fn setup_blend_between_on_demands(
        &mut self,
        host: &mut dyn ComponentHost,
        from_run: usize,
        to_run: usize,
        actor: usize,
    ) -> Option<usize> {
        let from = self.on_demands.get(from_run)?.state;
        let to = self.on_demands.get(to_run)?.state;
        let index = self.setup_blend(host, from, to, actor)?;
        let blend = &mut self.blends[index];
        blend.from_on_demand = Some(from_run);
        blend.to_on_demand = Some(to_run);
        Some(index)
    }

    /// Pull an actor out of its blend, rebinding it to the blend's destination slot.
    pub(super) fn remove_from_current_blend(&mut self, host: &mut dyn ComponentHost, actor: usize) {
        let Some(index) = self.actors.get(actor).and_then(|d| d.blend_instance) else {
            return;
        };
        let Some(blend) = self.blends.get_mut(index) else {
            return;
        };
        remove_from_cohort(&mut blend.actors, actor);
        let output = self.blend_pool.get(blend.helper).and_then(|h| h.output_slot());
        if let Some(output) = output {
            self.set_leader_for_actor(host, actor, output);
        }
        if let Some(data) = self.actors.get_mut(actor) {
            data.blend_instance = None;
            data.blending = false;
        }
    }
}
