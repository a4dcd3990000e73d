//! Unregistration and swap-remove bookkeeping.
//!
//! Every dense array is compacted with `swap_remove`. Each removal rewrites the
//! back-references that pointed at the moved element and clears the ones that
//! pointed at the removed element.

use log::{debug, info};

use super::SharingScheduler;
use crate::host::ComponentHost;
use crate::ids::ActorId;
use crate::instances::{remap_index, remove_from_cohort, OnDemandInstance};

impl SharingScheduler {
    /// Detach an actor's components and drop its row.
    ///
    /// The actor moved into the vacated row has its components repointed and
    /// its handle callback fired with the new handle.
    pub fn unregister_actor(&mut self, host: &mut dyn ComponentHost, actor: ActorId) -> bool {
        let Some(index) = self.find_actor(actor) else {
            return false;
        };
        let last = self.actors.len() - 1;

        let mut rows = self.actors[index].components.clone();
        for &c in &rows {
            if let Some(row) = self.components.get(c) {
                host.set_leader(row.component, None);
                host.set_tick_enabled(row.component, true);
            }
        }
        // highest first, so rows still pending removal never get moved
        rows.sort_unstable_by(|a, b| b.cmp(a));
        for c in rows {
            self.remove_component(c);
        }

        for blend in &mut self.blends {
            retarget_cohort(&mut blend.actors, index, last);
        }
        for run in &mut self.on_demands {
            retarget_cohort(&mut run.actors, index, last);
        }
        for overlay in &mut self.additives {
            remap_index(&mut overlay.actor, index, last);
        }

        if index != last {
            for &c in &self.actors[last].components {
                if let Some(row) = self.components.get_mut(c) {
                    row.actor = index;
                }
            }
        }
        self.actors.swap_remove(index);

        info!("sharing: unregistered actor {:?} from {}", actor, self.skeleton);
        if index != last {
            let handle = self.handle_for_index(index);
            self.actors[index].on_handle.call(handle);
        }
        true
    }

    /// Detach every actor. Instances keep running with empty cohorts.
    pub fn unregister_all_actors(&mut self, host: &mut dyn ComponentHost) {
        for row in &self.components {
            host.set_leader(row.component, None);
            host.set_tick_enabled(row.component, true);
        }
        for blend in &mut self.blends {
            blend.actors.clear();
        }
        for run in &mut self.on_demands {
            run.actors.clear();
        }
        for overlay in &mut self.additives {
            overlay.actor = None;
        }
        if !self.actors.is_empty() {
            info!("sharing: unregistered {} actors from {}", self.actors.len(), self.skeleton);
        }
        self.components.clear();
        self.actors.clear();
    }

    /// Unregister everything and stop every transition, returning helpers to their pools.
    pub fn clear_actor_data(&mut self, host: &mut dyn ComponentHost) {
        self.unregister_all_actors(host);

        for blend in std::mem::take(&mut self.blends) {
            if let Some(evaluator) = self.blend_pool.get_mut(blend.helper) {
                evaluator.stop(host);
            }
            self.blend_pool.release(blend.helper);
        }
        for overlay in std::mem::take(&mut self.additives) {
            self.free_additive_helper(host, overlay.helper);
        }
        self.on_demands.clear();
        for state in self.catalog.states_mut() {
            state.current_frame_on_demand = None;
        }
        self.blend_exhaustion_logged = false;
        self.additive_exhaustion_logged = false;
        debug!("sharing: cleared actor data for {}", self.skeleton);
    }

    fn remove_component(&mut self, index: usize) {
        let last = self.components.len() - 1;
        if index != last {
            let owner = self.components[last].actor;
            if let Some(data) = self.actors.get_mut(owner) {
                for c in data.components.iter_mut().filter(|c| **c == last) {
                    *c = index;
                }
            }
        }
        self.components.swap_remove(index);
    }

    pub(super) fn remove_blend_instance(&mut self, index: usize) {
        let last = self.blends.len() - 1;
        self.blends.swap_remove(index);
        for data in &mut self.actors {
            remap_index(&mut data.blend_instance, index, last);
        }
    }

    /// Swap-remove a run and return it. References to it are cleared.
    pub(super) fn remove_on_demand_instance(&mut self, index: usize) -> OnDemandInstance {
        let last = self.on_demands.len() - 1;
        let removed = self.on_demands.swap_remove(index);
        for data in &mut self.actors {
            remap_index(&mut data.on_demand_instance, index, last);
        }
        for blend in &mut self.blends {
            remap_index(&mut blend.from_on_demand, index, last);
            remap_index(&mut blend.to_on_demand, index, last);
        }
        for state in self.catalog.states_mut() {
            remap_index(&mut state.current_frame_on_demand, index, last);
        }
        removed
    }

    pub(super) fn remove_additive_instance(&mut self, index: usize) {
        let last = self.additives.len() - 1;
        self.additives.swap_remove(index);
        for data in &mut self.actors {
            remap_index(&mut data.additive_instance, index, last);
        }
    }
}

/// Drop `removed` from a cohort and rename `last` to `removed`.
fn retarget_cohort(cohort: &mut Vec<usize>, removed: usize, last: usize) {
    remove_from_cohort(cohort, removed);
    for a in cohort.iter_mut().filter(|a| **a == last) {
        *a = removed;
    }
}
