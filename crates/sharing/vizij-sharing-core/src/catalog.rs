//! Per-skeleton static state tables.
//!
//! Built once when a scheduler is set up. Apart from the per-frame usage bits
//! and the on-demand coalescing cache, nothing here changes afterwards.

use log::{debug, error};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{SkeletonSetup, StateEntry};
use crate::error::{Result, SharingError};
use crate::evaluator::AdditiveEvaluator;
use crate::host::{AssetResolver, ComponentHost, ComponentRole, ComponentSpawn};
use crate::ids::{ClipId, ComponentId, SkeletonId, StateId};
use crate::pool::InstancePool;

/// Fraction of a clip over which looping slot start offsets are spread.
const STAGGER_SPAN: f32 = 0.9;

/// Number of distinct [`StateId`]s.
pub const MAX_STATES: usize = u8::MAX as usize + 1;

/// One shared evaluator slot.
#[derive(Clone, Debug)]
pub struct EvaluatorSlot {
    pub component: ComponentId,
    pub clip: ClipId,
    pub clip_length: f32,
    /// Used by at least one actor or instance this frame.
    pub in_use: bool,
    /// `in_use` as computed at the end of the previous tick.
    pub previous_in_use: bool,
    /// Some follower needs a full pose from this slot this frame.
    pub tick_required: bool,
}

/// Static description of one logical state plus its slots.
#[derive(Clone, Debug, Default)]
pub struct AnimationState {
    pub id: StateId,
    /// False for ids the processor knows about but the setup never mentions.
    pub configured: bool,
    pub on_demand: bool,
    pub additive: bool,
    pub return_to_previous: bool,
    pub forward_to: Option<StateId>,
    pub blend_time: f32,
    pub wiggle_time: f32,
    pub requires_curves: bool,
    pub slots: Vec<EvaluatorSlot>,
    /// Overlay clip of an additive state.
    pub additive_clip: Option<ClipId>,
    pub additive_length: f32,
    /// On-demand instance created for this state during the current tick.
    pub current_frame_on_demand: Option<usize>,
}

impl AnimationState {
    fn unconfigured(id: StateId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_component(&self, index: usize) -> Option<ComponentId> {
        self.slots.get(index).map(|slot| slot.component)
    }

    /// Mean clip length over the slots.
    pub fn average_clip_length(&self) -> f32 {
        if self.slots.is_empty() {
            return 0.0;
        }
        self.slots.iter().map(|s| s.clip_length).sum::<f32>() / self.slots.len() as f32
    }

    pub fn is_running(&self) -> bool {
        self.slots.iter().any(|s| s.in_use)
    }
}

/// All states of one skeleton, indexed by [`StateId`].
#[derive(Clone, Debug)]
pub struct StateCatalog {
    skeleton: SkeletonId,
    states: Vec<AnimationState>,
}

/// Shared inputs for building every state of one skeleton.
pub(crate) struct CatalogBuild<'a, R: Rng> {
    pub setup: &'a SkeletonSetup,
    pub assets: &'a dyn AssetResolver,
    pub host: &'a mut dyn ComponentHost,
    pub rng: &'a mut R,
    pub additive_pool: &'a mut InstancePool<AdditiveEvaluator>,
    pub visible: bool,
}

impl StateCatalog {
    /// Build the table for `state_count` states from a skeleton setup.
    ///
    /// Fails on the first configuration error; components created before the
    /// failure are left to the host.
    pub(crate) fn build<R: Rng>(state_count: usize, ctx: CatalogBuild<'_, R>) -> Result<Self> {
        let CatalogBuild {
            setup,
            assets,
            host,
            rng,
            additive_pool,
            visible,
        } = ctx;
        let skeleton = setup.skeleton.clone();
        if state_count > MAX_STATES {
            error!(
                "sharing: processor for {} defines {} states, at most {} are addressable",
                skeleton, state_count, MAX_STATES
            );
            return Err(SharingError::TooManyStates {
                skeleton,
                count: state_count,
                limit: MAX_STATES,
            });
        }
        if !assets.has_mesh(&setup.mesh) {
            error!("sharing: mesh {} for skeleton {} could not be resolved", setup.mesh, skeleton);
            return Err(SharingError::UnresolvedMesh {
                skeleton,
                mesh: setup.mesh.clone(),
            });
        }

        let mut states: Vec<AnimationState> = (0..=u8::MAX)
            .take(state_count)
            .map(|i| AnimationState::unconfigured(StateId(i)))
            .collect();

        for entry in &setup.states {
            let index = entry.state.index();
            let Some(slot) = states.get(index) else {
                error!("sharing: state {} outside the processor range {}", entry.state, state_count);
                return Err(SharingError::UnknownState {
                    skeleton,
                    state: entry.state,
                    count: state_count,
                });
            };
            if slot.configured {
                error!("sharing: duplicate entries in setup for state {}", entry.state);
                return Err(SharingError::DuplicateState {
                    skeleton,
                    state: entry.state,
                });
            }
            if let Some(forward) = entry.forward_to {
                if forward.index() >= state_count {
                    error!("sharing: state {} forwards to unknown state {}", entry.state, forward);
                    return Err(SharingError::UnknownState {
                        skeleton,
                        state: forward,
                        count: state_count,
                    });
                }
            }

            let built = build_state(entry, setup, assets, host, rng, additive_pool, visible)?;
            states[index] = built;
        }

        debug!(
            "sharing: catalog for {} built, {} states, {} slots",
            skeleton,
            states.len(),
            states.iter().map(AnimationState::slot_count).sum::<usize>()
        );
        Ok(Self { skeleton, states })
    }

    pub fn skeleton(&self) -> &SkeletonId {
        &self.skeleton
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn contains(&self, state: StateId) -> bool {
        state.index() < self.states.len()
    }

    pub fn get(&self, state: StateId) -> Option<&AnimationState> {
        self.states.get(state.index())
    }

    pub fn get_mut(&mut self, state: StateId) -> Option<&mut AnimationState> {
        self.states.get_mut(state.index())
    }

    pub fn states(&self) -> &[AnimationState] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [AnimationState] {
        &mut self.states
    }

    pub fn is_on_demand(&self, state: StateId) -> bool {
        self.get(state).is_some_and(|s| s.on_demand)
    }

    pub fn is_additive(&self, state: StateId) -> bool {
        self.get(state).is_some_and(|s| s.additive)
    }

    pub fn blend_time(&self, state: StateId) -> f32 {
        self.get(state).map_or(0.0, |s| s.blend_time)
    }

    pub fn slot_count(&self, state: StateId) -> usize {
        self.get(state).map_or(0, AnimationState::slot_count)
    }

    pub fn slot_component(&self, state: StateId, index: usize) -> Option<ComponentId> {
        self.get(state).and_then(|s| s.slot_component(index))
    }

    /// State and slot index owning `component`, if it is a slot at all.
    pub fn find_slot(&self, component: ComponentId) -> Option<(StateId, usize)> {
        self.states.iter().find_map(|state| {
            state
                .slots
                .iter()
                .position(|slot| slot.component == component)
                .map(|index| (state.id, index))
        })
    }

    /// Mark a slot as used this frame; out-of-range slots are ignored.
    pub fn set_in_use(&mut self, state: StateId, index: usize, in_use: bool) {
        if let Some(slot) = self.get_mut(state).and_then(|s| s.slots.get_mut(index)) {
            slot.in_use = in_use;
        }
    }

    pub fn set_tick_required(&mut self, state: StateId, index: usize) {
        if let Some(slot) = self.get_mut(state).and_then(|s| s.slots.get_mut(index)) {
            slot.tick_required = true;
        }
    }

    /// Every slot component, for visibility toggles.
    pub fn slot_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.states
            .iter()
            .flat_map(|state| state.slots.iter().map(|slot| slot.component))
    }
}

/// Build one state's table entry and create its slot (or additive helper) components.
fn build_state<R: Rng>(
    entry: &StateEntry,
    setup: &SkeletonSetup,
    assets: &dyn AssetResolver,
    host: &mut dyn ComponentHost,
    rng: &mut R,
    additive_pool: &mut InstancePool<AdditiveEvaluator>,
    visible: bool,
) -> Result<AnimationState> {
    let skeleton = &setup.skeleton;
    let mut state = AnimationState {
        id: entry.state,
        configured: true,
        on_demand: entry.on_demand,
        additive: entry.additive,
        return_to_previous: entry.return_to_previous,
        forward_to: entry.forward_to,
        blend_time: entry.blend_time.max(0.0),
        requires_curves: entry.requires_curves,
        ..AnimationState::default()
    };

    let enabled = entry.setups.iter().filter(|s| s.enabled).count();
    let per_setup_on_demand = if enabled > 0 {
        entry.max_concurrent_instances.div_ceil(enabled)
    } else {
        0
    };

    let mut additive_helpers = 0usize;
    for (setup_index, anim) in entry.setups.iter().enumerate() {
        if !anim.enabled {
            continue;
        }
        let Some(length) = assets.clip_length(&anim.clip) else {
            error!(
                "sharing: clip {} for state {} of {} could not be resolved",
                anim.clip, entry.state, skeleton
            );
            return Err(SharingError::MissingClip {
                skeleton: skeleton.clone(),
                state: entry.state,
                clip: anim.clip.as_str().to_string(),
            });
        };

        let instances = if entry.on_demand {
            per_setup_on_demand
        } else {
            anim.num_randomized_instances.max(1)
        };

        for instance in 0..instances {
            if entry.additive {
                let index = additive_pool.len();
                let component = host.create_component(&ComponentSpawn {
                    role: ComponentRole::AdditiveHelper { index },
                    name: format!("{}_{}_additive{}", setup.mesh, entry.state, instance),
                    mesh: setup.mesh.clone(),
                    clip: None,
                    looping: false,
                    start_offset: 0.0,
                    paused: true,
                    requires_curves: false,
                    visible,
                });
                additive_pool.add(AdditiveEvaluator::new(component));
                additive_helpers += 1;
                continue;
            }

            let start_offset = if entry.on_demand || instance == 0 {
                0.0
            } else {
                length * STAGGER_SPAN / instances as f32 * instance as f32
            };
            let component = host.create_component(&ComponentSpawn {
                role: ComponentRole::StateSlot {
                    state: entry.state,
                    index: state.slots.len(),
                },
                name: format!("{}_{}_{}{}", setup.mesh, entry.state, setup_index, instance),
                mesh: setup.mesh.clone(),
                clip: Some(anim.clip.clone()),
                looping: true,
                start_offset,
                paused: entry.on_demand,
                requires_curves: entry.requires_curves,
                visible,
            });
            state.slots.push(EvaluatorSlot {
                component,
                clip: anim.clip.clone(),
                clip_length: length,
                in_use: false,
                previous_in_use: true,
                tick_required: false,
            });
        }
    }

    if entry.additive {
        if let Some(first) = entry.setups.first() {
            state.additive_length = assets.clip_length(&first.clip).ok_or_else(|| {
                SharingError::MissingClip {
                    skeleton: skeleton.clone(),
                    state: entry.state,
                    clip: first.clip.as_str().to_string(),
                }
            })?;
            state.additive_clip = Some(first.clip.clone());
        }
        if additive_helpers == 0 {
            error!("sharing: no additive helpers available for state {}", entry.state);
            return Err(SharingError::NoEvaluatorSlots {
                skeleton: skeleton.clone(),
                state: entry.state,
            });
        }
        return Ok(state);
    }

    if state.slots.is_empty() {
        error!("sharing: no components available for state {}", entry.state);
        return Err(SharingError::NoEvaluatorSlots {
            skeleton: skeleton.clone(),
            state: entry.state,
        });
    }

    state.wiggle_time = state.average_clip_length() * entry.wiggle_fraction;

    if entry.on_demand && entry.setups.len() > 1 {
        state.slots.shuffle(rng);
    }

    Ok(state)
}
