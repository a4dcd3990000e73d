//! World-level entry point: owns one scheduler per configured skeleton.

use log::{error, info};

use crate::config::{ManagerSettings, SharingSetup};
use crate::diagnostics::SharingStats;
use crate::error::{Result, SharingError};
use crate::host::{AssetResolver, ComponentHost};
use crate::ids::{ActorHandle, ActorId, ComponentId, SkeletonId};
use crate::instances::{ActorData, HandleCallback};
use crate::processor::StateProcessorRegistry;
use crate::scheduler::SharingScheduler;

/// Skeleton indices must fit the high byte of an [`ActorHandle`].
pub const MAX_SKELETONS: usize = 256;

/// A skinned component offered for sharing, with the skeleton it animates.
#[derive(Clone, Debug, PartialEq)]
pub struct SkinnedComponent {
    pub component: ComponentId,
    pub skeleton: SkeletonId,
}

/// Everything needed to register one actor.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorRegistration {
    pub actor: ActorId,
    pub components: Vec<SkinnedComponent>,
}

impl ActorRegistration {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ComponentId, skeleton: impl Into<String>) -> Self {
        self.components.push(SkinnedComponent {
            component,
            skeleton: SkeletonId::new(skeleton),
        });
        self
    }
}

/// Fans registration and ticking out to per-skeleton schedulers.
#[derive(Debug)]
pub struct SharingManager {
    settings: ManagerSettings,
    registry: StateProcessorRegistry,
    schedulers: Vec<SharingScheduler>,
    world_time: f32,
    last_stats: SharingStats,
}

impl SharingManager {
    pub fn new(settings: ManagerSettings, registry: StateProcessorRegistry) -> Self {
        Self {
            settings,
            registry,
            schedulers: Vec::new(),
            world_time: 0.0,
            last_stats: SharingStats::default(),
        }
    }

    /// Build a scheduler for every skeleton setup.
    ///
    /// A failing skeleton is skipped; its error is logged and returned, and the
    /// remaining skeletons are still set up.
    pub fn initialise(
        &mut self,
        setup: &SharingSetup,
        assets: &dyn AssetResolver,
        host: &mut dyn ComponentHost,
    ) -> Vec<SharingError> {
        if !self.schedulers.is_empty() {
            self.shutdown(host);
        }

        let mut errors = Vec::new();
        for skeleton in &setup.skeletons {
            if self.schedulers.len() >= MAX_SKELETONS {
                let err = SharingError::TooManySkeletons {
                    count: setup.skeletons.len(),
                    limit: MAX_SKELETONS,
                };
                error!("sharing: {}", err);
                errors.push(err);
                break;
            }
            let index = self.schedulers.len() as u8;
            match SharingScheduler::setup(
                index,
                skeleton,
                &setup.scalability,
                &self.registry,
                assets,
                host,
                &self.settings,
            ) {
                Ok(scheduler) => self.schedulers.push(scheduler),
                Err(err) => {
                    error!("sharing: setup for skeleton {} failed: {}", skeleton.skeleton, err);
                    errors.push(err);
                }
            }
        }
        info!(
            "sharing: initialised {} of {} skeletons",
            self.schedulers.len(),
            setup.skeletons.len()
        );
        errors
    }

    /// Register an actor with its skinned components.
    ///
    /// Returns `Ok(None)` while sharing is disabled. The scheduler is picked from
    /// the first component's skeleton and every component must be accepted by it.
    pub fn register_actor(
        &mut self,
        registration: &ActorRegistration,
        host: &mut dyn ComponentHost,
        on_handle: HandleCallback,
    ) -> Result<Option<ActorHandle>> {
        if !self.settings.enabled {
            return Ok(None);
        }
        let actor = registration.actor;
        let Some(first) = registration.components.first() else {
            error!("sharing: actor {:?} has no skinned components", actor);
            return Err(SharingError::NoComponents { actor });
        };

        let index = self.route(&first.skeleton).ok_or_else(|| {
            error!("sharing: no scheduler for skeleton {} (actor {:?})", first.skeleton, actor);
            SharingError::UnknownSkeleton {
                skeleton: first.skeleton.clone(),
            }
        })?;
        let scheduler = &mut self.schedulers[index];
        if let Some(bad) = registration
            .components
            .iter()
            .find(|c| !scheduler.accepts(&c.skeleton))
        {
            error!(
                "sharing: actor {:?} mixes skeleton {} into {}",
                actor,
                bad.skeleton,
                scheduler.skeleton()
            );
            return Err(SharingError::IncompatibleSkeletons {
                actor,
                expected: scheduler.skeleton().clone(),
                found: bad.skeleton.clone(),
            });
        }

        let components: Vec<ComponentId> = registration.components.iter().map(|c| c.component).collect();
        scheduler.register_actor(host, actor, &components, on_handle).map(Some)
    }

    /// Register an actor whose components all use `skeleton`.
    pub fn register_actor_with_skeleton(
        &mut self,
        actor: ActorId,
        skeleton: &SkeletonId,
        components: &[ComponentId],
        host: &mut dyn ComponentHost,
        on_handle: HandleCallback,
    ) -> Result<Option<ActorHandle>> {
        let registration = ActorRegistration {
            actor,
            components: components
                .iter()
                .map(|&component| SkinnedComponent {
                    component,
                    skeleton: skeleton.clone(),
                })
                .collect(),
        };
        self.register_actor(&registration, host, on_handle)
    }

    pub fn unregister_actor(&mut self, actor: ActorId, host: &mut dyn ComponentHost) -> bool {
        self.schedulers
            .iter_mut()
            .any(|scheduler| scheduler.unregister_actor(host, actor))
    }

    /// Write an actor's significance. Stale handles are ignored.
    pub fn update_significance(&mut self, handle: ActorHandle, significance: f32) -> bool {
        match self.actor_data_mut(handle) {
            Some(data) => {
                data.significance = significance;
                true
            }
            None => false,
        }
    }

    /// Advance world time by `dt` and run every scheduler's frame pipeline.
    pub fn tick(&mut self, dt: f32, host: &mut dyn ComponentHost) -> SharingStats {
        if !self.settings.enabled {
            return SharingStats::default();
        }
        self.world_time += dt;
        let mut stats = SharingStats::default();
        for scheduler in &mut self.schedulers {
            stats += scheduler.tick(host, self.world_time, self.settings.debug_level);
        }
        self.last_stats = stats;
        stats
    }

    /// Turning sharing off detaches every actor immediately.
    pub fn set_enabled(&mut self, enabled: bool, host: &mut dyn ComponentHost) {
        if self.settings.enabled == enabled {
            return;
        }
        self.settings.enabled = enabled;
        if !enabled {
            self.clear_actor_data(host);
        }
        info!("sharing: {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn set_debug_level(&mut self, level: u8) {
        self.settings.debug_level = level;
    }

    pub fn debug_level(&self) -> u8 {
        self.settings.debug_level
    }

    pub fn set_leaders_visible(&mut self, visible: bool, host: &mut dyn ComponentHost) {
        self.settings.leaders_visible = visible;
        for scheduler in &mut self.schedulers {
            scheduler.set_leaders_visible(host, visible);
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn clear_actor_data(&mut self, host: &mut dyn ComponentHost) {
        for scheduler in &mut self.schedulers {
            scheduler.clear_actor_data(host);
        }
    }

    pub fn unregister_all_actors(&mut self, host: &mut dyn ComponentHost) {
        for scheduler in &mut self.schedulers {
            scheduler.unregister_all_actors(host);
        }
    }

    /// Detach everything and drop all schedulers.
    pub fn shutdown(&mut self, host: &mut dyn ComponentHost) {
        self.clear_actor_data(host);
        if !self.schedulers.is_empty() {
            info!("sharing: shutting down {} schedulers", self.schedulers.len());
        }
        self.schedulers.clear();
        self.last_stats = SharingStats::default();
    }

    pub fn handle_for(&self, actor: ActorId) -> Option<ActorHandle> {
        self.schedulers.iter().find_map(|scheduler| {
            scheduler
                .find_actor(actor)
                .map(|index| scheduler.handle_for_index(index))
        })
    }

    pub fn actor_state(&self, handle: ActorHandle) -> Option<&ActorData> {
        self.schedulers
            .get(usize::from(handle.skeleton_index()))?
            .actor(handle.actor_index() as usize)
    }

    fn actor_data_mut(&mut self, handle: ActorHandle) -> Option<&mut ActorData> {
        self.schedulers
            .get_mut(usize::from(handle.skeleton_index()))?
            .actor_mut(handle.actor_index() as usize)
    }

    pub fn schedulers(&self) -> &[SharingScheduler] {
        &self.schedulers
    }

    pub fn scheduler(&self, index: usize) -> Option<&SharingScheduler> {
        self.schedulers.get(index)
    }

    /// Scheduler serving `skeleton`, exact matches first.
    pub fn scheduler_for(&self, skeleton: &SkeletonId) -> Option<&SharingScheduler> {
        self.route(skeleton).map(|index| &self.schedulers[index])
    }

    pub fn world_time(&self) -> f32 {
        self.world_time
    }

    pub fn last_stats(&self) -> SharingStats {
        self.last_stats
    }

    fn route(&self, skeleton: &SkeletonId) -> Option<usize> {
        self.schedulers
            .iter()
            .position(|s| s.skeleton() == skeleton)
            .or_else(|| self.schedulers.iter().position(|s| s.accepts(skeleton)))
    }
}
