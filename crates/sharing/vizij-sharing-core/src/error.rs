//! Error types for scheduler setup and actor registration

use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, SkeletonId, StateId};

/// Failures surfaced by setup and registration.
///
/// Nothing in the per-frame path returns an error; exhaustion of pools and
/// slots is handled with logged fallbacks instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SharingError {
    /// No state processor registered under the configured name
    #[error("State processor not found: {name} (skeleton {skeleton})")]
    MissingStateProcessor { skeleton: SkeletonId, name: String },

    /// The configured mesh could not be resolved
    #[error("Mesh could not be resolved: {mesh} (skeleton {skeleton})")]
    UnresolvedMesh { skeleton: SkeletonId, mesh: String },

    /// A configured state is outside the processor's state range
    #[error("Unknown state {state} for skeleton {skeleton} (processor defines {count})")]
    UnknownState {
        skeleton: SkeletonId,
        state: StateId,
        count: usize,
    },

    /// The same state was configured twice
    #[error("Duplicate state {state} in setup for skeleton {skeleton}")]
    DuplicateState { skeleton: SkeletonId, state: StateId },

    /// The processor defines more states than a state id can address
    #[error("Processor for skeleton {skeleton} defines {count} states (limit {limit})")]
    TooManyStates {
        skeleton: SkeletonId,
        count: usize,
        limit: usize,
    },

    /// A configured state produced no evaluator slots
    #[error("No evaluator slots created for state {state} (skeleton {skeleton})")]
    NoEvaluatorSlots { skeleton: SkeletonId, state: StateId },

    /// An animation clip could not be resolved
    #[error("Clip not found: {clip} for state {state} (skeleton {skeleton})")]
    MissingClip {
        skeleton: SkeletonId,
        state: StateId,
        clip: String,
    },

    /// No scheduler matches the skeleton
    #[error("No scheduler for skeleton {skeleton}")]
    UnknownSkeleton { skeleton: SkeletonId },

    /// The actor has no skinned components
    #[error("Actor {actor:?} has no skinned components")]
    NoComponents { actor: ActorId },

    /// The actor's components reference skeletons that cannot share one scheduler
    #[error("Actor {actor:?} mixes incompatible skeletons {expected} and {found}")]
    IncompatibleSkeletons {
        actor: ActorId,
        expected: SkeletonId,
        found: SkeletonId,
    },

    /// More actors than an actor handle can address
    #[error("Too many actors for skeleton {skeleton} (limit {limit})")]
    TooManyActors { skeleton: SkeletonId, limit: usize },

    /// More skeletons than an actor handle can address
    #[error("Too many skeletons: {count} (limit {limit})")]
    TooManySkeletons { count: usize, limit: usize },
}

impl SharingError {
    /// True for failures detected while building a skeleton's scheduler
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingStateProcessor { .. }
                | Self::UnresolvedMesh { .. }
                | Self::UnknownState { .. }
                | Self::DuplicateState { .. }
                | Self::TooManyStates { .. }
                | Self::NoEvaluatorSlots { .. }
                | Self::MissingClip { .. }
                | Self::TooManySkeletons { .. }
        )
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingStateProcessor { .. } => "processor",
            Self::UnresolvedMesh { .. } | Self::MissingClip { .. } => "asset",
            Self::UnknownState { .. }
            | Self::DuplicateState { .. }
            | Self::TooManyStates { .. }
            | Self::NoEvaluatorSlots { .. } => "catalog",
            Self::TooManySkeletons { .. } => "setup",
            Self::UnknownSkeleton { .. }
            | Self::NoComponents { .. }
            | Self::IncompatibleSkeletons { .. }
            | Self::TooManyActors { .. } => "registration",
        }
    }
}

/// Result alias for sharing operations
pub type Result<T> = std::result::Result<T, SharingError>;
