//! Vizij Sharing Core (engine-agnostic)
//!
//! Crowds of skinned actors share a small pool of evaluating components per
//! animation state. Actors follow one of those leaders instead of ticking their
//! own animation; blends, one-shot (on-demand) clips and additive overlays are
//! borrowed from fixed pools and handed back when they finish.
//!
//! The crate never touches meshes directly. Adapters implement
//! [`ComponentHost`] and [`AssetResolver`] and pass them into [`SharingManager`].

pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod ids;
pub mod instances;
pub mod manager;
pub mod pool;
pub mod processor;
pub mod scheduler;

// Re-exports for consumers (adapters)
pub use catalog::{AnimationState, EvaluatorSlot, StateCatalog, MAX_STATES};
pub use config::{AnimationSetup, ManagerSettings, ScalabilitySettings, SharingSetup, SkeletonSetup, StateEntry};
pub use diagnostics::{ActorDebugState, SharingStats, SlotDebugState};
pub use error::{Result, SharingError};
pub use evaluator::{AdditiveEvaluator, BlendEvaluator};
pub use host::{AssetResolver, ComponentHost, ComponentRole, ComponentSpawn};
pub use ids::{ActorHandle, ActorId, ClipId, ComponentId, SkeletonId, StateId, MAX_ACTOR_INDEX};
pub use instances::{ActorData, AdditiveInstance, BlendInstance, ComponentData, HandleCallback, OnDemandInstance};
pub use manager::{ActorRegistration, SharingManager, SkinnedComponent, MAX_SKELETONS};
pub use pool::{InstancePool, PoolHandle};
pub use processor::{ProcessorFactory, StateDecision, StateProcessor, StateProcessorRegistry};
pub use scheduler::SharingScheduler;
