//! Per-skeleton runtime: actor rows, in-flight instances and the frame pipeline.
//!
//! Each tick runs, in order: blend instances, on-demand instances, additive
//! instances, actor states, kickoff of instances created this frame, optional
//! debug output, then the slot tick-state update. Later stages read bits set by
//! earlier ones, so the order is fixed.

mod actors;
mod additive;
mod blend;
mod on_demand;
mod removal;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

use crate::catalog::{CatalogBuild, StateCatalog};
use crate::config::{ManagerSettings, ScalabilitySettings, SkeletonSetup};
use crate::diagnostics::{ActorDebugState, SharingStats, SlotDebugState};
use crate::error::{Result, SharingError};
use crate::evaluator::{AdditiveEvaluator, BlendEvaluator};
use crate::host::{AssetResolver, ComponentHost, ComponentRole, ComponentSpawn};
use crate::ids::{ActorHandle, ActorId, ComponentId, SkeletonId, StateId};
use crate::instances::{ActorData, AdditiveInstance, BlendInstance, ComponentData, OnDemandInstance};
use crate::pool::InstancePool;
use crate::processor::{StateProcessor, StateProcessorRegistry};

/// Runtime state for one shared skeleton.
pub struct SharingScheduler {
    index: u8,
    skeleton: SkeletonId,
    compatible: Vec<SkeletonId>,
    scalability: ScalabilitySettings,
    processor: Box<dyn StateProcessor>,
    catalog: StateCatalog,
    actors: Vec<ActorData>,
    components: Vec<ComponentData>,
    blends: Vec<BlendInstance>,
    on_demands: Vec<OnDemandInstance>,
    additives: Vec<AdditiveInstance>,
    blend_pool: InstancePool<BlendEvaluator>,
    additive_pool: InstancePool<AdditiveEvaluator>,
    rng: StdRng,
    world_time: f32,
    blend_exhaustion_logged: bool,
    additive_exhaustion_logged: bool,
}

impl fmt::Debug for SharingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharingScheduler")
            .field("index", &self.index)
            .field("skeleton", &self.skeleton)
            .field("actors", &self.actors.len())
            .field("blends", &self.blends.len())
            .field("on_demands", &self.on_demands.len())
            .field("additives", &self.additives.len())
            .finish_non_exhaustive()
    }
}

impl SharingScheduler {
    /// Build the scheduler for one skeleton setup.
    ///
    /// Creates every slot and helper component through `host`. Any configuration
    /// error aborts this skeleton only.
    pub fn setup(
        index: u8,
        setup: &SkeletonSetup,
        scalability: &ScalabilitySettings,
        registry: &StateProcessorRegistry,
        assets: &dyn AssetResolver,
        host: &mut dyn ComponentHost,
        settings: &ManagerSettings,
    ) -> Result<Self> {
        let processor = registry.create(&setup.state_processor).ok_or_else(|| {
            SharingError::MissingStateProcessor {
                skeleton: setup.skeleton.clone(),
                name: setup.state_processor.clone(),
            }
        })?;

        let mut rng = match settings.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(index))),
            None => StdRng::from_os_rng(),
        };

        let mut additive_pool = InstancePool::new();
        let catalog = StateCatalog::build(
            processor.state_count(),
            CatalogBuild {
                setup,
                assets,
                host: &mut *host,
                rng: &mut rng,
                additive_pool: &mut additive_pool,
                visible: settings.leaders_visible,
            },
        )?;

        let mut blend_pool = InstancePool::new();
        if scalability.use_blend_transitions {
            for blend_index in 0..scalability.max_concurrent_blends {
                let component = host.create_component(&ComponentSpawn {
                    role: ComponentRole::BlendHelper { index: blend_index },
                    name: format!("{}_blend{}", setup.mesh, blend_index),
                    mesh: setup.mesh.clone(),
                    clip: None,
                    looping: false,
                    start_offset: 0.0,
                    paused: false,
                    requires_curves: false,
                    visible: settings.leaders_visible,
                });
                blend_pool.add(BlendEvaluator::new(component));
            }
        }

        info!(
            "sharing: skeleton {} ready ({} states, {} blend helpers, {} additive helpers)",
            setup.skeleton,
            catalog.len(),
            blend_pool.len(),
            additive_pool.len()
        );

        Ok(Self {
            index,
            skeleton: setup.skeleton.clone(),
            compatible: setup.compatible_skeletons.clone(),
            scalability: scalability.clone(),
            processor,
            catalog,
            actors: Vec::new(),
            components: Vec::new(),
            blends: Vec::new(),
            on_demands: Vec::new(),
            additives: Vec::new(),
            blend_pool,
            additive_pool,
            rng,
            world_time: 0.0,
            blend_exhaustion_logged: false,
            additive_exhaustion_logged: false,
        })
    }

    /// Run the full frame pipeline at `world_time`.
    pub fn tick(&mut self, host: &mut dyn ComponentHost, world_time: f32, debug_level: u8) -> SharingStats {
        self.world_time = world_time;

        self.tick_blend_instances(host);
        self.tick_on_demand_instances(host);
        self.tick_additive_instances(host);
        self.tick_actor_states(host);
        self.kickoff_instances(host);
        if debug_level >= 1 {
            self.tick_debug_information(debug_level);
        }
        self.tick_animation_states(host);

        self.stats()
    }

    // ---- accessors -------------------------------------------------------

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn skeleton(&self) -> &SkeletonId {
        &self.skeleton
    }

    /// True when actors of `skeleton` may be routed here.
    pub fn accepts(&self, skeleton: &SkeletonId) -> bool {
        &self.skeleton == skeleton || self.compatible.iter().any(|s| s == skeleton)
    }

    pub fn world_time(&self) -> f32 {
        self.world_time
    }

    pub fn catalog(&self) -> &StateCatalog {
        &self.catalog
    }

    pub fn actors(&self) -> &[ActorData] {
        &self.actors
    }

    pub fn actor(&self, index: usize) -> Option<&ActorData> {
        self.actors.get(index)
    }

    pub(crate) fn actor_mut(&mut self, index: usize) -> Option<&mut ActorData> {
        self.actors.get_mut(index)
    }

    pub fn components(&self) -> &[ComponentData] {
        &self.components
    }

    pub fn blend_instances(&self) -> &[BlendInstance] {
        &self.blends
    }

    pub fn on_demand_instances(&self) -> &[OnDemandInstance] {
        &self.on_demands
    }

    pub fn additive_instances(&self) -> &[AdditiveInstance] {
        &self.additives
    }

    pub fn blend_pool(&self) -> &InstancePool<BlendEvaluator> {
        &self.blend_pool
    }

    pub fn additive_pool(&self) -> &InstancePool<AdditiveEvaluator> {
        &self.additive_pool
    }

    pub fn find_actor(&self, actor: ActorId) -> Option<usize> {
        self.actors.iter().position(|a| a.actor == actor)
    }

    pub fn handle_for_index(&self, index: usize) -> ActorHandle {
        ActorHandle::new(self.index, index as u32)
    }

    /// Leader of an actor's first component.
    pub fn actor_leader(&self, index: usize) -> Option<ComponentId> {
        let first = *self.actors.get(index)?.components.first()?;
        self.components.get(first)?.leader
    }

    pub fn state_name(&self, state: StateId) -> String {
        self.processor.state_name(state)
    }

    /// Every slot and helper component owned by this scheduler.
    pub fn leader_components(&self) -> Vec<ComponentId> {
        self.catalog
            .slot_components()
            .chain(self.blend_pool.iter().map(BlendEvaluator::component))
            .chain(self.additive_pool.iter().map(AdditiveEvaluator::component))
            .collect()
    }

    pub fn stats(&self) -> SharingStats {
        let mut stats = SharingStats {
            actors: self.actors.len(),
            components: self.components.len(),
            blends: self.blends.len(),
            on_demands: self.on_demands.len(),
            additives: self.additives.len(),
            ..SharingStats::default()
        };
        for state in self.catalog.states() {
            let running = state.slots.iter().filter(|s| s.previous_in_use).count();
            if running > 0 {
                stats.running_states += 1;
            }
            stats.running_slots += running;
        }
        stats
    }

    // ---- shared helpers --------------------------------------------------

    fn should_blend(&self, actor: usize) -> bool {
        self.scalability.use_blend_transitions
            && self
                .actors
                .get(actor)
                .is_some_and(|a| a.significance >= self.scalability.blend_significance)
    }

    fn any_requires_tick(&self, cohort: &[usize]) -> bool {
        cohort
            .iter()
            .any(|&a| self.actors.get(a).is_some_and(|d| d.requires_tick))
    }

    /// Uniform pick among the state's slots.
    fn determine_permutation(&mut self, state: StateId) -> usize {
        match self.catalog.slot_count(state) {
            0 => 0,
            count => self.rng.random_range(0..count),
        }
    }

    /// Point every component of an actor at `leader`.
    ///
    /// While an additive overlay runs the followers stay on the overlay helper
    /// and `leader` becomes the overlay's base instead.
    fn set_leader_for_actor(&mut self, host: &mut dyn ComponentHost, actor: usize, leader: ComponentId) {
        host.set_tick_enabled(leader, true);

        let Some(data) = self.actors.get(actor) else {
            return;
        };
        if data.running_additive {
            if let Some(instance) = data.additive_instance.and_then(|i| self.additives.get_mut(i)) {
                let overlay = self.additive_pool.get(instance.helper).map(AdditiveEvaluator::component);
                if overlay != Some(leader) {
                    instance.base = Some(leader);
                    if let Some(helper) = self.additive_pool.get_mut(instance.helper) {
                        helper.update_base(host, leader);
                    }
                    return;
                }
            }
        }
        self.bind_components(host, actor, Some(leader));
    }

    fn bind_components(&mut self, host: &mut dyn ComponentHost, actor: usize, leader: Option<ComponentId>) {
        let Some(data) = self.actors.get(actor) else {
            return;
        };
        for &c in &data.components {
            if let Some(row) = self.components.get_mut(c) {
                row.leader = leader;
                host.set_leader(row.component, leader);
            }
        }
    }

    /// Bind an actor to a specific slot of a shared state.
    fn set_permutation(&mut self, host: &mut dyn ComponentHost, state: StateId, actor: usize, permutation: usize) {
        let count = self.catalog.slot_count(state);
        if count == 0 {
            warn!("sharing: no slots available for state {}", self.state_name(state));
            return;
        }
        let permutation = permutation.min(count - 1);
        if let Some(slot) = self.catalog.slot_component(state, permutation) {
            self.set_leader_for_actor(host, actor, slot);
        }
        if let Some(data) = self.actors.get_mut(actor) {
            data.permutation = permutation;
        }
    }

    /// Hard switch: bind an actor to a fresh slot (or on-demand run) of `state`.
    fn setup_follower(&mut self, host: &mut dyn ComponentHost, state: StateId, actor: usize) {
        let Some(info) = self.catalog.get(state) else {
            return;
        };
        if info.slots.is_empty() {
            warn!(
                "sharing: no slots available for state {}, make sure it has an enabled clip",
                self.state_name(state)
            );
            // same as registering straight into such a state
            if !self.actors.get(actor).is_some_and(|d| d.running_additive) {
                self.bind_components(host, actor, None);
            }
            return;
        }

        if !info.on_demand {
            let permutation = self.determine_permutation(state);
            self.set_permutation(host, state, actor, permutation);
        } else if let Some(index) = self.setup_on_demand_instance(host, state) {
            let slot = self.on_demands[index].slot;
            if let Some(component) = self.catalog.slot_component(state, slot) {
                self.set_leader_for_actor(host, actor, component);
            }
            self.on_demands[index].actors.push(actor);
            self.join_on_demand(actor, index);
            if let Some(data) = self.actors.get_mut(actor) {
                data.permutation = 0;
            }
        }
    }

    /// Rebind an actor to what its own rows say it is playing.
    fn settle_actor(&mut self, host: &mut dyn ComponentHost, actor: usize) {
        let Some(data) = self.actors.get(actor) else {
            return;
        };
        let (state, permutation) = (data.current_state, data.permutation);
        let run_slot = data
            .on_demand_instance
            .filter(|_| data.running_on_demand)
            .and_then(|r| self.on_demands.get(r))
            .and_then(|run| self.catalog.slot_component(run.state, run.slot));

        if let Some(slot) = run_slot {
            self.set_leader_for_actor(host, actor, slot);
        } else if !self.catalog.is_on_demand(state) && self.catalog.slot_count(state) > 0 {
            self.set_permutation(host, state, actor, permutation);
        } else {
            self.setup_follower(host, state, actor);
        }
    }

    /// Slot the actor's pose is evaluated on, seen through a running overlay.
    ///
    /// `None` while it follows a blend helper or nothing.
    fn bound_slot(&self, actor: usize) -> Option<(StateId, usize)> {
        let data = self.actors.get(actor)?;
        let mut source = self.actor_leader(actor)?;
        if data.running_additive {
            if let Some(overlay) = data.additive_instance.and_then(|i| self.additives.get(i)) {
                let helper = self.additive_pool.get(overlay.helper).map(AdditiveEvaluator::component);
                if helper == Some(source) {
                    source = overlay.base?;
                }
            }
        }
        if self.catalog.slot_component(data.current_state, data.permutation) == Some(source) {
            return Some((data.current_state, data.permutation));
        }
        self.catalog.find_slot(source)
    }

    /// Record that an actor now runs on-demand instance `index`.
    fn join_on_demand(&mut self, actor: usize, index: usize) {
        if let Some(data) = self.actors.get_mut(actor) {
            data.on_demand_instance = Some(index);
            data.running_on_demand = true;
            data.blending = false;
        }
    }

    fn relabel(&mut self, actor: usize, state: StateId) {
        if let Some(data) = self.actors.get_mut(actor) {
            debug!(
                "sharing: actor {} state {} -> {} (perm {})",
                actor, data.current_state, state, data.permutation
            );
            data.previous_state = data.current_state;
            data.current_state = state;
        }
    }

    // ---- stage 5: kickoff --------------------------------------------------

    /// Arm blends and on-demand runs created during this frame's actor pass.
    fn kickoff_instances(&mut self, host: &mut dyn ComponentHost) {
        for b in 0..self.blends.len() {
            if self.blends[b].active {
                continue;
            }
            let requires_tick = self.any_requires_tick(&self.blends[b].actors);
            let blend = &mut self.blends[b];
            blend.started = false;
            let from_count = self.catalog.slot_count(blend.from_state);
            let to_count = self.catalog.slot_count(blend.to_state);
            blend.from_permutation = blend.from_permutation.min(from_count.saturating_sub(1));
            blend.to_permutation = blend.to_permutation.min(to_count.saturating_sub(1));

            let mut from = self.catalog.slot_component(blend.from_state, blend.from_permutation);
            let mut to = self.catalog.slot_component(blend.to_state, blend.to_permutation);
            if self.catalog.is_on_demand(blend.to_state) {
                if let Some(run) = blend.to_on_demand.and_then(|i| self.on_demands.get(i)) {
                    to = self.catalog.slot_component(blend.to_state, run.slot);
                }
            }
            if self.catalog.is_on_demand(blend.from_state) {
                if let Some(run) = blend.from_on_demand.and_then(|i| self.on_demands.get(i)) {
                    from = self.catalog.slot_component(blend.from_state, run.slot);
                }
            }

            debug!(
                "sharing: starting blend {} -> {} for {:?}",
                blend.from_state, blend.to_state, blend.actors
            );

            for &a in &blend.actors {
                if let Some(data) = self.actors.get_mut(a) {
                    data.permutation = blend.to_permutation;
                    data.blending = !data.running_on_demand;
                }
            }

            // the cohort is bound to the helper next frame, keep both ends alive until then
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

            match (from, to, self.blend_pool.get_mut(blend.helper)) {
                (Some(from), Some(to), Some(helper)) => helper.setup(host, from, to, blend.blend_time),
                _ => warn!(
                    "sharing: blend {} -> {} has no valid slots",
                    blend.from_state, blend.to_state
                ),
            }
            blend.active = true;
        }

        let now = self.world_time;
        for run in self.on_demands.iter_mut().filter(|o| !o.active) {
            run.active = true;
            run.start_time = now;
        }
    }

    // ---- stage 6: diagnostics ----------------------------------------------

    fn tick_debug_information(&self, debug_level: u8) {
        for state in self.debug_states() {
            debug!("sharing[{}] actor {:?} {}: {}", self.skeleton, state.actor, state.handle, state.label);
        }
        if debug_level >= 2 {
            for slot in self.slot_debug_states() {
                debug!(
                    "sharing[{}] state {} slot {}: in use {} - required {}",
                    self.skeleton, slot.state, slot.slot, slot.in_use, slot.tick_required
                );
            }
        }
    }

    /// Snapshot of every registered actor.
    pub fn debug_states(&self) -> Vec<ActorDebugState> {
        self.actors
            .iter()
            .enumerate()
            .map(|(index, data)| {
                let label = if let Some(blend) = data.blend_instance.and_then(|i| self.blends.get(i)) {
                    let left = (blend.end_time - self.world_time).max(0.0);
                    format!(
                        "Blending states - {} to {} [{:.3}]",
                        self.state_name(blend.from_state),
                        self.state_name(blend.to_state),
                        left
                    )
                } else if let Some(run) = data.on_demand_instance.filter(|&i| i < self.on_demands.len()) {
                    format!("On demand state - {} [{}]", self.state_name(data.current_state), run)
                } else {
                    format!(
                        "State - {} {:.2}",
                        self.state_name(data.current_state),
                        data.significance
                    )
                };
                ActorDebugState {
                    actor: data.actor,
                    handle: self.handle_for_index(index),
                    state: data.current_state,
                    previous_state: data.previous_state,
                    permutation: data.permutation,
                    significance: data.significance,
                    blending: data.blending,
                    on_demand: data.running_on_demand,
                    additive: data.running_additive,
                    leader: self.actor_leader(index),
                    label,
                }
            })
            .collect()
    }

    /// Current-frame bits of every slot.
    pub fn slot_debug_states(&self) -> Vec<SlotDebugState> {
        self.catalog
            .states()
            .iter()
            .flat_map(|state| {
                state.slots.iter().enumerate().map(move |(slot, bits)| SlotDebugState {
                    state: state.id,
                    slot,
                    component: bits.component,
                    in_use: bits.in_use,
                    tick_required: bits.tick_required,
                })
            })
            .collect()
    }

    // ---- stage 7: slot tick state ----------------------------------------------

    /// Turn slot ticking on or off on usage edges and roll the frame bits.
    fn tick_animation_states(&mut self, host: &mut dyn ComponentHost) {
        for state in self.catalog.states_mut() {
            for slot in state.slots.iter_mut() {
                if slot.in_use != slot.previous_in_use {
                    host.set_tick_enabled(slot.component, slot.in_use);
                } else if !slot.in_use && host.is_tick_enabled(slot.component) {
                    host.set_tick_enabled(slot.component, false);
                }
                host.set_full_pose_evaluation(slot.component, slot.tick_required);

                slot.previous_in_use = slot.in_use;
                slot.in_use = false;
                slot.tick_required = false;
            }
            state.current_frame_on_demand = None;
        }
    }

    pub(crate) fn set_leaders_visible(&mut self, host: &mut dyn ComponentHost, visible: bool) {
        for component in self.leader_components() {
            host.set_visible(component, visible);
        }
    }
}
