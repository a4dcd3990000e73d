//! Host-side contracts.
//!
//! The scheduler never owns meshes or clips. Adapters implement [`ComponentHost`]
//! to create and drive skinned components, and [`AssetResolver`] to answer
//! questions about assets during setup. Both are passed into the entry points
//! that need them, mirroring how resolvers are handed to `prebind`.

use crate::ids::{ActorId, ClipId, ComponentId, StateId};

/// What a component created by the scheduler is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentRole {
    /// Shared evaluator slot of a state.
    StateSlot { state: StateId, index: usize },
    /// Pooled blend helper.
    BlendHelper { index: usize },
    /// Pooled additive helper.
    AdditiveHelper { index: usize },
}

/// Everything the host needs to spawn one slot or helper component.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentSpawn {
    pub role: ComponentRole,
    pub name: String,
    pub mesh: String,
    /// Clip the component plays; helpers start without one.
    pub clip: Option<ClipId>,
    pub looping: bool,
    /// Initial playback position in seconds.
    pub start_offset: f32,
    /// Clip is held at the start until explicitly restarted.
    pub paused: bool,
    /// Followers receive animation curves as well as bone transforms.
    pub requires_curves: bool,
    pub visible: bool,
}

/// Mesh/component host driven by the scheduler.
///
/// Every method is infallible from the scheduler's point of view; ids are only
/// ever ones the host itself returned from [`ComponentHost::create_component`]
/// or supplied at registration.
pub trait ComponentHost {
    fn create_component(&mut self, spawn: &ComponentSpawn) -> ComponentId;

    /// Make `follower` copy its pose from `leader`, or evaluate on its own when `None`.
    fn set_leader(&mut self, follower: ComponentId, leader: Option<ComponentId>);

    fn set_tick_enabled(&mut self, component: ComponentId, enabled: bool);

    fn is_tick_enabled(&self, component: ComponentId) -> bool;

    /// Full pose evaluation versus visibility-gated cheap evaluation.
    fn set_full_pose_evaluation(&mut self, _component: ComponentId, _full: bool) {}

    /// Last world time the component was rendered.
    fn last_render_time(&self, _component: ComponentId) -> f32 {
        f32::NEG_INFINITY
    }

    /// Restart the component's clip from the beginning.
    fn restart_clip(&mut self, component: ComponentId);

    fn stop_clip(&mut self, _component: ComponentId) {}

    /// Point a blend helper at two inputs, blending towards `pins[target]`.
    fn configure_blend(
        &mut self,
        helper: ComponentId,
        pins: [ComponentId; 2],
        target: usize,
        duration: f32,
    );

    /// Point an additive helper at a base pose and an additive clip.
    fn configure_additive(&mut self, helper: ComponentId, base: ComponentId, clip: &ClipId);

    /// `component` evaluates after `prerequisite` within a frame.
    fn add_tick_prerequisite(&mut self, _component: ComponentId, _prerequisite: ComponentId) {}

    fn remove_tick_prerequisite(&mut self, _component: ComponentId, _prerequisite: ComponentId) {}

    fn set_visible(&mut self, _component: ComponentId, _visible: bool) {}

    /// Significance used when an actor is registered.
    fn actor_significance(&self, _actor: ActorId) -> f32 {
        0.0
    }
}

/// Synchronous asset lookups made while building state catalogs.
pub trait AssetResolver {
    fn has_mesh(&self, mesh: &str) -> bool;

    /// Length in seconds of a loaded clip, `None` when it cannot be resolved.
    fn clip_length(&self, clip: &ClipId) -> Option<f32>;
}
