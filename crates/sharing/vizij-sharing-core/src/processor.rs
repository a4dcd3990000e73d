//! Pluggable per-skeleton state decisions.

use hashbrown::HashMap;
use std::fmt;

use crate::ids::{ActorId, StateId};

/// Output of [`StateProcessor::determine_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateDecision {
    pub state: StateId,
    /// When false a changed state is recorded without touching any slots.
    pub should_process: bool,
}

impl StateDecision {
    pub fn process(state: StateId) -> Self {
        Self {
            state,
            should_process: true,
        }
    }

    pub fn relabel(state: StateId) -> Self {
        Self {
            state,
            should_process: false,
        }
    }
}

/// Decides which logical state an actor should be in each frame.
///
/// The scheduler calls this once per actor per tick and at registration, and
/// holds no decision logic of its own.
pub trait StateProcessor {
    /// Number of states; valid ids are `0..state_count()`.
    fn state_count(&self) -> usize;

    fn determine_state(
        &mut self,
        actor: ActorId,
        current: StateId,
        on_demand: Option<StateId>,
    ) -> StateDecision;

    /// Display name used in diagnostics.
    fn state_name(&self, state: StateId) -> String {
        format!("State{}", state.0)
    }
}

pub type ProcessorFactory = Box<dyn Fn() -> Box<dyn StateProcessor>>;

/// Named processor factories, referenced by `SkeletonSetup::state_processor`.
#[derive(Default)]
pub struct StateProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl StateProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn StateProcessor> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn StateProcessor>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for StateProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("StateProcessorRegistry")
            .field("processors", &names)
            .finish()
    }
}
