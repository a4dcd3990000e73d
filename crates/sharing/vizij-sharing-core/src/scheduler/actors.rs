//! Actor registration and the per-frame state decision pass.

use log::{debug, info, warn};

use super::SharingScheduler;
use crate::error::{Result, SharingError};
use crate::host::ComponentHost;
use crate::ids::{ActorHandle, ActorId, ComponentId, StateId, MAX_ACTOR_INDEX};
use crate::instances::{ActorData, ComponentData, HandleCallback};

/// Components whose last render is this recent still count as visible.
const RECENTLY_RENDERED: f32 = 1.0;

impl SharingScheduler {
    /// Add an actor and bind its components to the state the processor picks.
    ///
    /// `on_handle` fires once with the new handle before this returns, and
    /// again whenever the actor is renumbered by a later unregistration.
    pub fn register_actor(
        &mut self,
        host: &mut dyn ComponentHost,
        actor: ActorId,
        components: &[ComponentId],
        on_handle: HandleCallback,
    ) -> Result<ActorHandle> {
        if components.is_empty() {
            return Err(SharingError::NoComponents { actor });
        }
        if let Some(existing) = self.find_actor(actor) {
            warn!("sharing: actor {:?} is already registered with {}", actor, self.skeleton);
            return Ok(self.handle_for_index(existing));
        }
        let index = self.actors.len();
        if index > MAX_ACTOR_INDEX as usize {
            return Err(SharingError::TooManyActors {
                skeleton: self.skeleton.clone(),
                limit: MAX_ACTOR_INDEX as usize + 1,
            });
        }

        let significance = host.actor_significance(actor);
        let decision = self.processor.determine_state(actor, StateId(0), None);
        let state = if self.catalog.contains(decision.state) {
            decision.state
        } else {
            warn!(
                "sharing: processor returned unknown state {} for actor {:?}, using {}",
                decision.state,
                actor,
                StateId(0)
            );
            StateId(0)
        };

        self.actors.push(ActorData::new(actor, state, significance, on_handle));
        for &component in components {
            host.set_tick_enabled(component, false);
            self.actors[index].components.push(self.components.len());
            self.components.push(ComponentData {
                component,
                actor: index,
                leader: None,
            });
        }
        self.setup_follower(host, state, index);

        if self.catalog.is_on_demand(state) {
            let now = self.world_time;
            if let Some(run) = self.actors[index]
                .on_demand_instance
                .and_then(|r| self.on_demands.get_mut(r))
            {
                run.active = true;
                run.start_time = now;
            }
        }

        let handle = self.handle_for_index(index);
        self.actors[index].on_handle.call(handle);
        info!(
            "sharing: registered actor {:?} on {} as {} in state {}",
            actor,
            self.skeleton,
            handle,
            self.state_name(state)
        );
        Ok(handle)
    }

    /// Stage 4: ask the processor for every actor's state and act on changes.
    pub(super) fn tick_actor_states(&mut self, host: &mut dyn ComponentHost) {
        let now = self.world_time;
        for a in 0..self.actors.len() {
            let requires_tick = {
                let data = &self.actors[a];
                data.significance >= self.scalability.tick_significance
                    || data.components.iter().any(|&c| {
                        self.components
                            .get(c)
                            .is_some_and(|row| host.last_render_time(row.component) > now - RECENTLY_RENDERED)
                    })
            };
            self.actors[a].requires_tick = requires_tick;

            let (actor, current, on_demand_state) = {
                let data = &self.actors[a];
                let on_demand_state = data
                    .on_demand_instance
                    .and_then(|r| self.on_demands.get(r))
                    .map(|run| run.state);
                (data.actor, data.current_state, on_demand_state)
            };
            let decision = self.processor.determine_state(actor, current, on_demand_state);
            let desired = if self.catalog.contains(decision.state) {
                decision.state
            } else {
                warn!(
                    "sharing: processor returned unknown state {} for actor {:?}",
                    decision.state, actor
                );
                current
            };

            if desired != current {
                self.change_state(host, a, desired, decision.should_process);
            }
            self.keep_alive(a);
        }
    }

    fn change_state(&mut self, host: &mut dyn ComponentHost, actor: usize, desired: StateId, should_process: bool) {
        // an unbound actor has no pose to blend from
        let should_blend = self.should_blend(actor) && self.actor_leader(actor).is_some();
        let (current, running_on_demand, running_additive, run) = {
            let data = &self.actors[actor];
            (
                data.current_state,
                data.running_on_demand,
                data.running_additive,
                data.on_demand_instance,
            )
        };
        let desired_on_demand = self.catalog.is_on_demand(desired);

        if !should_process || (running_on_demand && !desired_on_demand) {
            self.relabel(actor, desired);
        } else if self.catalog.is_additive(desired) {
            // overlays leave the base state untouched, so it still needs its slot
            if !running_additive {
                if let Some(overlay) = self.setup_additive_instance(host, desired, actor) {
                    let data = &mut self.actors[actor];
                    data.running_additive = true;
                    data.additive_instance = Some(overlay);
                }
            }
        } else if desired_on_demand {
            let needs_run = !running_on_demand
                || run
                    .and_then(|r| self.on_demands.get(r))
                    .map_or(true, |r| r.state != desired);
            if !needs_run {
                return;
            }
            let Some(new_run) = self.setup_on_demand_instance(host, desired) else {
                return;
            };
            self.remove_from_current_blend(host, actor);
            self.remove_from_current_on_demand(actor);

            let mut hard_switch = true;
            if should_blend && self.catalog.blend_time(desired) > f32::EPSILON {
                let blend = match run.filter(|_| running_on_demand) {
                    Some(old_run) => self.setup_blend_between_on_demands(host, old_run, new_run, actor),
                    None => self.setup_blend_to_on_demand(host, current, new_run, actor),
                };
                hard_switch = blend.is_none();
            }
            if hard_switch {
                self.switch_between_on_demands(host, run.filter(|_| running_on_demand), new_run, actor);
            }

            self.on_demands[new_run].actors.push(actor);
            self.join_on_demand(actor, new_run);
            self.relabel(actor, desired);
        } else {
            self.remove_from_current_blend(host, actor);
            let blended = should_blend && self.setup_blend(host, current, desired, actor).is_some();
            if !blended {
                self.setup_follower(host, desired, actor);
            }
            debug!(
                "sharing: actor {} {} {} -> {}",
                actor,
                if blended { "blending" } else { "switching" },
                current,
                desired
            );
            self.relabel(actor, desired);
        }
    }

    /// Mark the slot the actor is bound to as used this frame.
    ///
    /// Slots behind a blend helper are kept alive by the blend itself.
    fn keep_alive(&mut self, actor: usize) {
        let Some((state, slot)) = self.bound_slot(actor) else {
            return;
        };
        self.catalog.set_in_use(state, slot, true);
        if self.actors[actor].requires_tick {
            self.catalog.set_tick_required(state, slot);
        }
    }
}
