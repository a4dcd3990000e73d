//! Static configuration for sharing setups and manager behaviour.
//!
//! Everything here is plain serde data so setups can be authored as JSON and
//! handed to [`crate::SharingManager::initialise`].

use serde::{Deserialize, Serialize};

use crate::ids::{ClipId, SkeletonId, StateId};

/// Top-level setup: scalability knobs plus one entry per shared skeleton.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingSetup {
    pub scalability: ScalabilitySettings,
    pub skeletons: Vec<SkeletonSetup>,
}

impl SharingSetup {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Thresholds and limits that trade quality for cost.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalabilitySettings {
    /// Whether state changes may blend through pooled helpers.
    pub use_blend_transitions: bool,
    /// Minimum significance for an actor to blend instead of hard switching.
    pub blend_significance: f32,
    /// Size of each skeleton's blend helper pool.
    pub max_concurrent_blends: usize,
    /// Minimum significance for an actor to require full pose evaluation.
    pub tick_significance: f32,
}

impl Default for ScalabilitySettings {
    fn default() -> Self {
        Self {
            use_blend_transitions: true,
            blend_significance: 0.5,
            max_concurrent_blends: 1,
            tick_significance: 0.1,
        }
    }
}

/// Setup for one shared skeleton.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkeletonSetup {
    pub skeleton: SkeletonId,
    /// Other skeletons whose actors may be routed to this scheduler.
    #[serde(default)]
    pub compatible_skeletons: Vec<SkeletonId>,
    /// Mesh every slot and helper component is created with.
    pub mesh: String,
    /// Name of the state processor in the [`crate::StateProcessorRegistry`].
    pub state_processor: String,
    #[serde(default)]
    pub states: Vec<StateEntry>,
}

impl SkeletonSetup {
    pub fn accepts(&self, skeleton: &SkeletonId) -> bool {
        &self.skeleton == skeleton || self.compatible_skeletons.iter().any(|s| s == skeleton)
    }
}

/// Configuration of one logical animation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StateEntry {
    pub state: StateId,
    /// Clip is restarted per request instead of looping on pre-bound slots.
    pub on_demand: bool,
    /// Layered on top of the current pose through an additive helper.
    pub additive: bool,
    /// Duration of transitions into this state; zero disables blending into it.
    pub blend_time: f32,
    /// On completion of an on-demand run, go back to the state before it.
    pub return_to_previous: bool,
    /// On completion of an on-demand run, continue in this state.
    pub forward_to: Option<StateId>,
    /// Upper bound on concurrently running on-demand instances (and additive helpers).
    pub max_concurrent_instances: usize,
    /// Fraction of the average clip length after which a busy on-demand run may be stolen.
    pub wiggle_fraction: f32,
    /// Slots propagate animation curves to their followers.
    pub requires_curves: bool,
    pub setups: Vec<AnimationSetup>,
}

impl Default for StateEntry {
    fn default() -> Self {
        Self {
            state: StateId(0),
            on_demand: false,
            additive: false,
            blend_time: 0.0,
            return_to_previous: false,
            forward_to: None,
            max_concurrent_instances: 1,
            wiggle_fraction: 0.0,
            requires_curves: false,
            setups: Vec::new(),
        }
    }
}

/// One clip variation of a state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnimationSetup {
    pub clip: ClipId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Number of time-staggered slots created for a looping state.
    #[serde(default = "default_randomized")]
    pub num_randomized_instances: usize,
}

impl AnimationSetup {
    pub fn new(clip: impl Into<String>) -> Self {
        Self {
            clip: ClipId::new(clip),
            enabled: true,
            num_randomized_instances: 1,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_randomized() -> usize {
    1
}

/// Runtime switches owned by the manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Feature switch; while off registration is a no-op.
    pub enabled: bool,
    /// 0 = off, 1 = per-actor state dump, 2 = also per-slot bits.
    pub debug_level: u8,
    /// Whether slot and helper components are rendered.
    pub leaders_visible: bool,
    /// Seed for permutation picks and slot shuffles; `None` seeds from the OS.
    pub random_seed: Option<u64>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_level: 0,
            leaders_visible: false,
            random_seed: None,
        }
    }
}
