#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::{HashMap, HashSet};

use vizij_sharing::{
    ActorHandle, ActorId, AnimationSetup, AssetResolver, ClipId, ComponentHost, ComponentId, ComponentRole,
    ComponentSpawn, HandleCallback, ManagerSettings, SharingManager, SharingScheduler, SharingSetup, SharingStats,
    SkeletonId, SkeletonSetup, StateDecision, StateEntry, StateId, StateProcessor, StateProcessorRegistry,
};
use vizij_test_fixtures::AssetTable;

/// Ids handed out by the host start here, well clear of test actor components.
pub const FIRST_HOST_ID: u64 = 10_000;

/// Host that records every call the scheduler makes.
#[derive(Default)]
pub struct RecordingHost {
    next_id: u64,
    pub spawned: Vec<(ComponentId, ComponentSpawn)>,
    pub leaders: HashMap<ComponentId, Option<ComponentId>>,
    pub ticking: HashSet<ComponentId>,
    /// Number of times each component's tick flag actually changed.
    pub tick_flips: HashMap<ComponentId, usize>,
    pub full_pose: HashMap<ComponentId, bool>,
    pub restarts: Vec<ComponentId>,
    pub stops: Vec<ComponentId>,
    pub blends: Vec<(ComponentId, [ComponentId; 2], usize, f32)>,
    pub additives: Vec<(ComponentId, ComponentId, ClipId)>,
    pub visible: HashMap<ComponentId, bool>,
    pub significance: HashMap<ActorId, f32>,
    pub render_times: HashMap<ComponentId, f32>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_HOST_ID,
            ..Self::default()
        }
    }

    pub fn leader_of(&self, component: ComponentId) -> Option<ComponentId> {
        self.leaders.get(&component).copied().flatten()
    }

    pub fn is_ticking(&self, component: ComponentId) -> bool {
        self.ticking.contains(&component)
    }

    pub fn total_flips(&self) -> usize {
        self.tick_flips.values().sum()
    }

    pub fn spawn_of(&self, component: ComponentId) -> Option<&ComponentSpawn> {
        self.spawned.iter().find(|(c, _)| *c == component).map(|(_, s)| s)
    }

    pub fn components_with_role(&self, pred: impl Fn(&ComponentRole) -> bool) -> Vec<ComponentId> {
        self.spawned
            .iter()
            .filter(|(_, s)| pred(&s.role))
            .map(|(c, _)| *c)
            .collect()
    }
}

impl ComponentHost for RecordingHost {
    fn create_component(&mut self, spawn: &ComponentSpawn) -> ComponentId {
        if self.next_id < FIRST_HOST_ID {
            self.next_id = FIRST_HOST_ID;
        }
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        self.spawned.push((id, spawn.clone()));
        self.visible.insert(id, spawn.visible);
        id
    }

    fn set_leader(&mut self, follower: ComponentId, leader: Option<ComponentId>) {
        self.leaders.insert(follower, leader);
    }

    fn set_tick_enabled(&mut self, component: ComponentId, enabled: bool) {
        let changed = if enabled {
            self.ticking.insert(component)
        } else {
            self.ticking.remove(&component)
        };
        if changed {
            *self.tick_flips.entry(component).or_default() += 1;
        }
    }

    fn is_tick_enabled(&self, component: ComponentId) -> bool {
        self.ticking.contains(&component)
    }

    fn set_full_pose_evaluation(&mut self, component: ComponentId, full: bool) {
        self.full_pose.insert(component, full);
    }

    fn last_render_time(&self, component: ComponentId) -> f32 {
        self.render_times.get(&component).copied().unwrap_or(f32::NEG_INFINITY)
    }

    fn restart_clip(&mut self, component: ComponentId) {
        self.restarts.push(component);
    }

    fn stop_clip(&mut self, component: ComponentId) {
        self.stops.push(component);
    }

    fn configure_blend(&mut self, helper: ComponentId, pins: [ComponentId; 2], target: usize, duration: f32) {
        self.blends.push((helper, pins, target, duration));
    }

    fn configure_additive(&mut self, helper: ComponentId, base: ComponentId, clip: &ClipId) {
        self.additives.push((helper, base, clip.clone()));
    }

    fn set_visible(&mut self, component: ComponentId, visible: bool) {
        self.visible.insert(component, visible);
    }

    fn actor_significance(&self, actor: ActorId) -> f32 {
        self.significance.get(&actor).copied().unwrap_or(0.0)
    }
}

/// Asset resolver backed by a fixture asset table.
pub struct MapAssets(pub AssetTable);

impl AssetResolver for MapAssets {
    fn has_mesh(&self, mesh: &str) -> bool {
        self.0.meshes.iter().any(|m| m == mesh)
    }

    fn clip_length(&self, clip: &ClipId) -> Option<f32> {
        self.0.clips.get(clip.as_str()).copied()
    }
}

/// What the script asks of one actor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cue {
    /// Move to the state, once any running one-shot has finished.
    Want(StateId),
    /// Record the state without touching slots.
    Relabel(StateId),
    /// Move to the state straight away, cutting a running one-shot short.
    Interrupt(StateId),
}

pub type Script = Rc<RefCell<HashMap<ActorId, Cue>>>;

/// Returns whatever the test scripted for an actor. Unless told to interrupt,
/// it holds actors in a running on-demand state until it finishes.
pub struct ScriptedProcessor {
    script: Script,
    state_count: usize,
}

impl StateProcessor for ScriptedProcessor {
    fn state_count(&self) -> usize {
        self.state_count
    }

    fn determine_state(&mut self, actor: ActorId, _current: StateId, on_demand: Option<StateId>) -> StateDecision {
        let cue = self.script.borrow().get(&actor).copied();
        match (cue, on_demand) {
            (Some(Cue::Interrupt(state)), _) => StateDecision::process(state),
            (_, Some(state)) => StateDecision::process(state),
            (Some(Cue::Want(state)), None) => StateDecision::process(state),
            (Some(Cue::Relabel(state)), None) => StateDecision::relabel(state),
            (None, None) => StateDecision::process(StateId(0)),
        }
    }

    fn state_name(&self, state: StateId) -> String {
        match state.0 {
            0 => "Idle".into(),
            1 => "Run".into(),
            2 => "Wave".into(),
            3 => "Nod".into(),
            4 => "Cheer".into(),
            n => format!("State{n}"),
        }
    }
}

pub fn scripted_registry(script: &Script, state_count: usize) -> StateProcessorRegistry {
    let mut registry = StateProcessorRegistry::new();
    let script = script.clone();
    registry.register("scripted", move || {
        Box::new(ScriptedProcessor {
            script: script.clone(),
            state_count,
        })
    });
    registry
}

pub const IDLE: StateId = StateId(0);
pub const RUN: StateId = StateId(1);
pub const WAVE: StateId = StateId(2);
pub const NOD: StateId = StateId(3);
pub const CHEER: StateId = StateId(4);

/// Handles delivered to one actor's callback, in order.
pub type HandleLog = Rc<RefCell<Vec<ActorHandle>>>;

/// Idle with a single slot, Run with two slots and a 0.3s blend in.
pub fn idle_run_setup() -> (SharingSetup, AssetTable) {
    let mut run = AnimationSetup::new("run_a");
    run.num_randomized_instances = 2;
    let setup = SharingSetup {
        skeletons: vec![SkeletonSetup {
            skeleton: SkeletonId::new("crowd"),
            compatible_skeletons: Vec::new(),
            mesh: "crowd_mesh".into(),
            state_processor: "scripted".into(),
            states: vec![
                StateEntry {
                    state: IDLE,
                    setups: vec![AnimationSetup::new("idle_a")],
                    ..StateEntry::default()
                },
                StateEntry {
                    state: RUN,
                    blend_time: 0.3,
                    setups: vec![run],
                    ..StateEntry::default()
                },
            ],
        }],
        ..SharingSetup::default()
    };
    let assets = AssetTable {
        meshes: vec!["crowd_mesh".into()],
        clips: [("idle_a".to_string(), 2.0), ("run_a".to_string(), 0.8)]
            .into_iter()
            .collect(),
    };
    (setup, assets)
}

/// Manager plus recording host and script, wired together.
pub struct Harness {
    pub manager: SharingManager,
    pub host: RecordingHost,
    pub script: Script,
}

impl Harness {
    pub fn new(setup: &SharingSetup, assets: AssetTable, seed: u64) -> Self {
        let script: Script = Rc::default();
        let settings = ManagerSettings {
            random_seed: Some(seed),
            ..ManagerSettings::default()
        };
        let mut manager = SharingManager::new(settings, scripted_registry(&script, 5));
        let mut host = RecordingHost::new();
        let errors = manager.initialise(setup, &MapAssets(assets), &mut host);
        assert!(errors.is_empty(), "unexpected setup errors: {errors:?}");
        Self { manager, host, script }
    }

    pub fn fixture(name: &str, seed: u64) -> anyhow::Result<Self> {
        let setup: SharingSetup = vizij_test_fixtures::sharing::setup(name)?;
        let assets = vizij_test_fixtures::sharing::assets(name)?;
        Ok(Self::new(&setup, assets, seed))
    }

    pub fn cue(&self, actor: u64, cue: Cue) {
        self.script.borrow_mut().insert(ActorId(actor), cue);
    }

    pub fn want(&self, actor: u64, state: StateId) {
        self.cue(actor, Cue::Want(state));
    }

    pub fn relabel(&self, actor: u64, state: StateId) {
        self.cue(actor, Cue::Relabel(state));
    }

    pub fn interrupt(&self, actor: u64, state: StateId) {
        self.cue(actor, Cue::Interrupt(state));
    }

    pub fn set_significance(&mut self, actor: u64, significance: f32) {
        self.host.significance.insert(ActorId(actor), significance);
        if let Some(handle) = self.manager.handle_for(ActorId(actor)) {
            self.manager.update_significance(handle, significance);
        }
    }

    /// Register `actor` with one component of the same id on `skeleton`.
    pub fn register(&mut self, actor: u64, skeleton: &str) -> (ActorHandle, HandleLog) {
        let log: HandleLog = Rc::default();
        let sink = log.clone();
        let handle = self
            .manager
            .register_actor_with_skeleton(
                ActorId(actor),
                &SkeletonId::new(skeleton),
                &[ComponentId(actor)],
                &mut self.host,
                HandleCallback::new(move |h| sink.borrow_mut().push(h)),
            )
            .expect("registration should succeed")
            .expect("sharing should be enabled");
        (handle, log)
    }

    pub fn tick(&mut self, dt: f32) -> SharingStats {
        self.manager.tick(dt, &mut self.host)
    }

    /// Tick at `dt` until at least `seconds` have passed.
    pub fn run_for(&mut self, seconds: f32, dt: f32) -> SharingStats {
        let target = self.manager.world_time() + seconds;
        let mut stats = SharingStats::default();
        while self.manager.world_time() < target {
            stats = self.tick(dt);
        }
        stats
    }

    /// Tick and check every cross-reference afterwards.
    pub fn tick_checked(&mut self, dt: f32) -> SharingStats {
        let stats = self.tick(dt);
        assert_consistent(self.scheduler(), &self.host);
        stats
    }

    pub fn run_checked(&mut self, seconds: f32, dt: f32) -> SharingStats {
        let target = self.manager.world_time() + seconds;
        let mut stats = SharingStats::default();
        while self.manager.world_time() < target {
            stats = self.tick_checked(dt);
        }
        stats
    }

    pub fn scheduler(&self) -> &SharingScheduler {
        self.manager.scheduler(0).expect("scheduler 0")
    }

    pub fn actor_index(&self, actor: u64) -> usize {
        self.scheduler()
            .find_actor(ActorId(actor))
            .expect("actor registered")
    }

    pub fn leader(&self, actor: u64) -> Option<ComponentId> {
        self.host.leader_of(ComponentId(actor))
    }

    pub fn slots(&self, state: StateId) -> Vec<ComponentId> {
        self.scheduler()
            .catalog()
            .get(state)
            .map(|s| s.slots.iter().map(|slot| slot.component).collect())
            .unwrap_or_default()
    }
}

/// Cross-reference checks that must hold at every frame boundary.
pub fn assert_consistent(scheduler: &SharingScheduler, host: &RecordingHost) {
    let actors = scheduler.actors();
    let blends = scheduler.blend_instances();
    let runs = scheduler.on_demand_instances();
    let overlays = scheduler.additive_instances();

    for (index, data) in actors.iter().enumerate() {
        assert!(
            !(data.blending && data.running_on_demand),
            "actor {index} is both blending and running on demand"
        );
        if let Some(b) = data.blend_instance {
            assert!(b < blends.len(), "actor {index} references missing blend {b}");
            assert!(blends[b].actors.contains(&index), "blend {b} lost actor {index}");
        }
        if let Some(r) = data.on_demand_instance {
            assert!(r < runs.len(), "actor {index} references missing run {r}");
            assert!(runs[r].actors.contains(&index), "run {r} lost actor {index}");
        }
        if let Some(o) = data.additive_instance {
            assert!(o < overlays.len(), "actor {index} references missing overlay {o}");
            assert_eq!(overlays[o].actor, Some(index));
        }
        assert_eq!(data.running_additive, data.additive_instance.is_some());
        for &c in &data.components {
            assert_eq!(scheduler.components()[c].actor, index);
        }
    }
    for (row, component) in scheduler.components().iter().enumerate() {
        assert!(actors[component.actor].components.contains(&row));
        assert_eq!(host.leader_of(component.component), component.leader);
        if let Some(leader) = component.leader {
            assert!(
                host.is_ticking(leader),
                "{:?} of actor {} follows {:?}, which is not ticking",
                component.component,
                component.actor,
                leader
            );
        }
    }
    for blend in blends {
        assert!(blend.active, "blend left unarmed at frame end");
        assert!(blend.actors.iter().all(|&a| a < actors.len()));
    }
    for run in runs {
        assert!(run.active, "run left unarmed at frame end");
        assert!(run.actors.iter().all(|&a| a < actors.len()));
    }
    for overlay in overlays {
        assert!(overlay.actor.map_or(true, |a| a < actors.len()));
    }
    assert_eq!(scheduler.blend_pool().in_use_count(), blends.len());
    assert_eq!(scheduler.additive_pool().in_use_count(), overlays.len());
}
