//! Helper evaluators borrowed from pools by transitions and overlays.

use crate::host::ComponentHost;
use crate::ids::{ClipId, ComponentId};

/// A pooled component that blends between two slots.
///
/// Every `setup` flips which pin holds the destination, so a helper re-armed
/// straight after a previous blend starts from the pose it was just showing.
#[derive(Clone, Debug)]
pub struct BlendEvaluator {
    component: ComponentId,
    pins: [Option<ComponentId>; 2],
    flipped: bool,
    duration: f32,
}

impl BlendEvaluator {
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            pins: [None, None],
            flipped: false,
            duration: 0.0,
        }
    }

    #[inline]
    pub fn component(&self) -> ComponentId {
        self.component
    }

    #[inline]
    fn target_pin(&self) -> usize {
        usize::from(self.flipped)
    }

    pub fn setup(
        &mut self,
        host: &mut dyn ComponentHost,
        from: ComponentId,
        to: ComponentId,
        duration: f32,
    ) {
        self.clear_prerequisites(host);
        self.flipped = !self.flipped;
        let target = self.target_pin();
        self.pins[target] = Some(to);
        self.pins[1 - target] = Some(from);
        self.duration = duration;

        let pins = [from, to];
        let ordered = if target == 1 { pins } else { [to, from] };
        host.configure_blend(self.component, ordered, target, duration);
        host.add_tick_prerequisite(self.component, from);
        host.add_tick_prerequisite(self.component, to);
        host.set_tick_enabled(self.component, true);
    }

    pub fn stop(&mut self, host: &mut dyn ComponentHost) {
        host.set_tick_enabled(self.component, false);
        self.clear_prerequisites(host);
        self.pins = [None, None];
    }

    /// Slot that represents the finished blend.
    pub fn output_slot(&self) -> Option<ComponentId> {
        self.pins[self.target_pin()]
    }

    pub fn input_slot(&self) -> Option<ComponentId> {
        self.pins[1 - self.target_pin()]
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    fn clear_prerequisites(&mut self, host: &mut dyn ComponentHost) {
        for pin in self.pins.iter().flatten() {
            host.remove_tick_prerequisite(self.component, *pin);
        }
    }
}

/// A pooled component layering an additive clip over a base slot.
#[derive(Clone, Debug)]
pub struct AdditiveEvaluator {
    component: ComponentId,
    base: Option<ComponentId>,
    clip: Option<ClipId>,
}

impl AdditiveEvaluator {
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            base: None,
            clip: None,
        }
    }

    #[inline]
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn base(&self) -> Option<ComponentId> {
        self.base
    }

    pub fn clip(&self) -> Option<&ClipId> {
        self.clip.as_ref()
    }

    pub fn setup(&mut self, host: &mut dyn ComponentHost, base: ComponentId, clip: &ClipId) {
        self.clip = Some(clip.clone());
        self.rebind(host, base);
        host.set_tick_enabled(self.component, true);
    }

    /// Play the overlay from its first frame.
    pub fn start(&mut self, host: &mut dyn ComponentHost) {
        host.restart_clip(self.component);
    }

    /// Swap the pose the overlay is layered on while it keeps playing.
    pub fn update_base(&mut self, host: &mut dyn ComponentHost, base: ComponentId) {
        if self.base != Some(base) {
            self.rebind(host, base);
        }
    }

    pub fn stop(&mut self, host: &mut dyn ComponentHost) {
        host.set_tick_enabled(self.component, false);
        host.stop_clip(self.component);
        if let Some(base) = self.base.take() {
            host.remove_tick_prerequisite(self.component, base);
        }
    }

    fn rebind(&mut self, host: &mut dyn ComponentHost, base: ComponentId) {
        if let Some(previous) = self.base.replace(base) {
            host.remove_tick_prerequisite(self.component, previous);
        }
        host.add_tick_prerequisite(self.component, base);
        if let Some(clip) = &self.clip {
            host.configure_additive(self.component, base, clip);
        }
    }
}
