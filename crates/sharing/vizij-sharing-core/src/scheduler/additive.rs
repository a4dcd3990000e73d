//! Additive overlays layered over an actor's current pose.

use log::{debug, warn};

use super::SharingScheduler;
use crate::evaluator::AdditiveEvaluator;
use crate::host::ComponentHost;
use crate::ids::{ComponentId, StateId};
use crate::instances::AdditiveInstance;
use crate::pool::PoolHandle;

impl SharingScheduler {
    /// Stage 3: start overlays set up last frame and retire finished ones.
    pub(super) fn tick_additive_instances(&mut self, host: &mut dyn ComponentHost) {
        let now = self.world_time;
        let mut i = 0;
        while i < self.additives.len() {
            let overlay = &mut self.additives[i];
            if !overlay.active {
                overlay.active = true;
                let actor = overlay.actor;
                let helper = self.additive_pool.get_mut(overlay.helper).map(|h| {
                    h.start(host);
                    h.component()
                });
                if let (Some(actor), Some(helper)) = (actor, helper) {
                    self.set_leader_for_actor(host, actor, helper);
                }
            } else if now >= overlay.end_time {
                let (actor, base, helper) = (overlay.actor, overlay.base, overlay.helper);
                if let Some(data) = actor.and_then(|a| self.actors.get_mut(a)) {
                    data.running_additive = false;
                    data.additive_instance = None;
                }
                if let (Some(actor), Some(base)) = (actor, base) {
                    self.set_leader_for_actor(host, actor, base);
                }
                self.free_additive_helper(host, helper);
                debug!("sharing: additive overlay {} finished", self.additives[i].state);
                self.remove_additive_instance(i);
                continue;
            }
            i += 1;
        }
    }

    pub(super) fn free_additive_helper(&mut self, host: &mut dyn ComponentHost, helper: PoolHandle) {
        if let Some(evaluator) = self.additive_pool.get_mut(helper) {
            evaluator.stop(host);
        }
        self.additive_pool.release(helper);
        self.additive_exhaustion_logged = false;
    }

    /// Borrow a helper and layer `state`'s clip over the actor's current leader.
    ///
    /// The overlay starts playing on the next tick.
    pub(super) fn setup_additive_instance(
        &mut self,
        host: &mut dyn ComponentHost,
        state: StateId,
        actor: usize,
    ) -> Option<usize> {
        let info = self.catalog.get(state)?;
        let clip = info.additive_clip.clone()?;
        let length = info.additive_length;

        let data = self.actors.get(actor)?;
        let base = self
            .actor_leader(actor)
            .or_else(|| self.catalog.slot_component(data.current_state, data.permutation))?;

        let Some(helper) = self.additive_pool.try_acquire() else {
            if !self.additive_exhaustion_logged {
                warn!(
                    "sharing: no additive helpers left for {}, skipping {}",
                    self.skeleton,
                    self.state_name(state)
                );
                self.additive_exhaustion_logged = true;
            }
            return None;
        };
        if let Some(evaluator) = self.additive_pool.get_mut(helper) {
            evaluator.setup(host, base, &clip);
        }

        self.additives.push(AdditiveInstance {
            active: false,
            state,
            end_time: self.world_time + length,
            base: Some(base),
            helper,
            actor: Some(actor),
        });
        debug!("sharing: additive overlay {} set up for actor {}", state, actor);
        Some(self.additives.len() - 1)
    }

    /// Helper component rendering an overlay.
    pub fn additive_helper_component(&self, overlay: usize) -> Option<ComponentId> {
        let overlay = self.additives.get(overlay)?;
        self.additive_pool.get(overlay.helper).map(AdditiveEvaluator::component)
    }
}
