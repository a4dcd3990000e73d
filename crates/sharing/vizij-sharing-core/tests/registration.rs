mod common;

use common::*;
use vizij_sharing::{
    ActorHandle, ActorId, ActorRegistration, ComponentId, HandleCallback, ManagerSettings, SharingError,
    SharingManager, SharingSetup, SkeletonId,
};

fn crowd() -> Harness {
    Harness::fixture("crowd", 3).expect("crowd fixture")
}

#[test]
fn registration_errors_are_reported() {
    let mut h = crowd();

    let empty = ActorRegistration::new(ActorId(1));
    assert_eq!(
        h.manager.register_actor(&empty, &mut h.host, HandleCallback::noop()),
        Err(SharingError::NoComponents { actor: ActorId(1) })
    );

    let horse = ActorRegistration::new(ActorId(2)).with_component(ComponentId(2), "horse");
    assert_eq!(
        h.manager.register_actor(&horse, &mut h.host, HandleCallback::noop()),
        Err(SharingError::UnknownSkeleton {
            skeleton: SkeletonId::new("horse")
        })
    );

    let mixed = ActorRegistration::new(ActorId(3))
        .with_component(ComponentId(3), "crowd")
        .with_component(ComponentId(4), "horse");
    assert_eq!(
        h.manager.register_actor(&mixed, &mut h.host, HandleCallback::noop()),
        Err(SharingError::IncompatibleSkeletons {
            actor: ActorId(3),
            expected: SkeletonId::new("crowd"),
            found: SkeletonId::new("horse"),
        })
    );

    // nothing half-registered is left behind
    assert!(h.scheduler().actors().is_empty());
    assert!(h.scheduler().components().is_empty());
    assert!(!h.host.tick_flips.contains_key(&ComponentId(3)));
}

#[test]
fn compatible_skeleton_routes_to_shared_scheduler() {
    let mut h = crowd();
    let registration = ActorRegistration::new(ActorId(1))
        .with_component(ComponentId(1), "crowd_lod")
        .with_component(ComponentId(2), "crowd");

    let handle = h
        .manager
        .register_actor(&registration, &mut h.host, HandleCallback::noop())
        .expect("compatible skeletons register")
        .expect("enabled");

    assert_eq!(handle, ActorHandle::new(0, 0));
    let leader = h.host.leader_of(ComponentId(1)).expect("first component follows");
    assert_eq!(h.host.leader_of(ComponentId(2)), Some(leader));
    assert_eq!(h.scheduler().components().len(), 2);
    assert!(
        h.manager
            .scheduler_for(&SkeletonId::new("crowd_lod"))
            .is_some_and(|s| s.skeleton() == &SkeletonId::new("crowd"))
    );
    assert_consistent(h.scheduler(), &h.host);
}

#[test]
fn duplicate_registration_returns_existing_handle() {
    let mut h = crowd();
    let (first, _) = h.register(1, "crowd");
    let (second, log) = h.register(1, "crowd");

    assert_eq!(first, second);
    assert_eq!(h.scheduler().actors().len(), 1);
    assert_eq!(h.scheduler().components().len(), 1);
    // the second callback is never stored, so it never fires
    assert!(log.borrow().is_empty());
}

#[test]
fn significance_updates_ignore_stale_handles() {
    let mut h = crowd();
    let (handle, _) = h.register(1, "crowd");

    assert!(h.manager.update_significance(handle, 0.8));
    assert_eq!(h.manager.actor_state(handle).map(|d| d.significance), Some(0.8));

    assert!(!h.manager.update_significance(ActorHandle::new(0, 5), 1.0));
    assert!(!h.manager.update_significance(ActorHandle::new(3, 0), 1.0));

    assert!(h.manager.unregister_actor(ActorId(1), &mut h.host));
    assert!(!h.manager.update_significance(handle, 1.0));
    assert!(!h.manager.unregister_actor(ActorId(1), &mut h.host));
}

#[test]
fn registration_reads_host_significance() {
    let mut h = crowd();
    h.host.significance.insert(ActorId(7), 0.75);
    let (handle, _) = h.register(7, "crowd");
    assert_eq!(h.manager.actor_state(handle).map(|d| d.significance), Some(0.75));
}

#[test]
fn skeletons_get_their_own_handles() {
    let mut h = Harness::fixture("two-skeletons", 5).expect("fixture");
    assert_eq!(h.manager.schedulers().len(), 2);

    let (crowd_handle, _) = h.register(1, "crowd");
    let (horse_handle, _) = h.register(2, "horse");
    assert_eq!(crowd_handle, ActorHandle::new(0, 0));
    assert_eq!(horse_handle, ActorHandle::new(1, 0));
    assert_eq!(h.manager.handle_for(ActorId(2)), Some(horse_handle));

    let horse = h.manager.scheduler(1).expect("horse scheduler");
    let horse_slots: Vec<ComponentId> = horse
        .catalog()
        .get(IDLE)
        .expect("horse idle")
        .slots
        .iter()
        .map(|slot| slot.component)
        .collect();
    assert_eq!(horse_slots.len(), 3);
    assert!(horse_slots.contains(&h.leader(2).expect("horse leader")));
    assert!(h.slots(IDLE).contains(&h.leader(1).expect("crowd leader")));

    // blends are switched off for this setup, so no helpers exist
    assert!(h.scheduler().blend_pool().is_empty());

    let stats = h.tick(0.1);
    assert_eq!(stats.actors, 2);
    assert_eq!(stats.components, 2);
}

#[test]
fn broken_skeletons_are_skipped() {
    let setup: SharingSetup = vizij_test_fixtures::sharing::setup("broken").expect("fixture");
    let assets = vizij_test_fixtures::sharing::assets("broken").expect("assets");
    let script = Script::default();
    let mut manager = SharingManager::new(
        ManagerSettings {
            random_seed: Some(1),
            ..ManagerSettings::default()
        },
        scripted_registry(&script, 5),
    );
    let mut host = RecordingHost::new();

    let errors = manager.initialise(&setup, &MapAssets(assets), &mut host);

    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(matches!(errors[0], SharingError::MissingStateProcessor { .. }));
    assert!(matches!(errors[1], SharingError::DuplicateState { .. }));
    assert!(matches!(errors[2], SharingError::MissingClip { .. }));
    assert!(errors.iter().all(SharingError::is_configuration));

    assert_eq!(manager.schedulers().len(), 1);
    let scheduler = manager.scheduler(0).expect("crowd scheduler");
    assert_eq!(scheduler.skeleton(), &SkeletonId::new("crowd"));
    assert_eq!(scheduler.index(), 0);
}

#[test]
fn unregistering_last_actor_renumbers_nobody() {
    let mut h = crowd();
    let (_, first) = h.register(1, "crowd");
    let (_, second) = h.register(2, "crowd");
    h.tick(0.1);

    assert!(h.manager.unregister_actor(ActorId(2), &mut h.host));
    assert_eq!(first.borrow().len(), 1);
    assert_eq!(second.borrow().len(), 1);
    assert_eq!(h.leader(2), None);
    assert!(h.host.is_ticking(ComponentId(2)));
    assert_eq!(h.manager.handle_for(ActorId(1)), Some(ActorHandle::new(0, 0)));
    assert_consistent(h.scheduler(), &h.host);
}

#[test]
fn unregister_inside_blend_keeps_cohort_running() {
    let (setup, assets) = idle_run_setup();
    let mut h = Harness::new(&setup, assets, 19);
    h.host.significance.insert(ActorId(1), 1.0);
    h.host.significance.insert(ActorId(2), 1.0);
    h.register(1, "crowd");
    let (_, moved_log) = h.register(2, "crowd");
    h.tick(0.1);

    h.want(1, RUN);
    h.want(2, RUN);
    h.tick(0.1);
    h.tick(0.1);
    let to_slot = {
        let blend = &h.scheduler().blend_instances()[0];
        assert_eq!(blend.actors, vec![0, 1]);
        h.slots(RUN)[blend.to_permutation]
    };

    assert!(h.manager.unregister_actor(ActorId(1), &mut h.host));
    {
        let scheduler = h.scheduler();
        assert_eq!(scheduler.blend_instances()[0].actors, vec![0]);
        assert_eq!(scheduler.actors()[0].actor, ActorId(2));
        assert_eq!(scheduler.actors()[0].blend_instance, Some(0));
        assert_consistent(scheduler, &h.host);
    }
    assert_eq!(
        *moved_log.borrow(),
        vec![ActorHandle::new(0, 1), ActorHandle::new(0, 0)]
    );

    h.run_for(0.3, 0.1);
    let scheduler = h.scheduler();
    assert!(scheduler.blend_instances().is_empty());
    assert_eq!(h.leader(2), Some(to_slot));
    assert_eq!(h.leader(1), None);
    assert_consistent(scheduler, &h.host);
}

#[test]
fn leader_visibility_covers_slots_and_helpers() {
    let mut h = crowd();
    let spawned: Vec<ComponentId> = h.host.spawned.iter().map(|(c, _)| *c).collect();
    assert!(spawned.iter().all(|c| h.host.visible.get(c) == Some(&false)));

    h.manager.set_leaders_visible(true, &mut h.host);
    assert!(h.manager.settings().leaders_visible);
    for c in &spawned {
        assert_eq!(h.host.visible.get(c), Some(&true), "{c:?} stayed hidden");
    }

    h.manager.set_leaders_visible(false, &mut h.host);
    assert!(spawned.iter().all(|c| h.host.visible.get(c) == Some(&false)));
}

#[test]
fn shutdown_drops_schedulers() {
    let mut h = crowd();
    h.register(1, "crowd");
    h.tick(0.1);

    h.manager.shutdown(&mut h.host);
    assert!(h.manager.schedulers().is_empty());
    assert_eq!(h.leader(1), None);
    assert!(h.host.is_ticking(ComponentId(1)));
    assert_eq!(
        h.manager
            .register_actor_with_skeleton(
                ActorId(2),
                &SkeletonId::new("crowd"),
                &[ComponentId(2)],
                &mut h.host,
                HandleCallback::noop(),
            ),
        Err(SharingError::UnknownSkeleton {
            skeleton: SkeletonId::new("crowd")
        })
    );
}

#[test]
fn unbound_actor_hard_switches_into_first_base_state() {
    let mut h = crowd();
    h.host.significance.insert(ActorId(1), 1.0);
    h.want(1, NOD);
    h.register(1, "crowd");
    assert_eq!(h.leader(1), None);
    h.tick_checked(0.1);
    assert_eq!(h.leader(1), None);

    // nothing to blend from, so no helper is spent
    h.want(1, RUN);
    h.tick_checked(0.1);
    let scheduler = h.scheduler();
    assert!(scheduler.blend_instances().is_empty());
    assert_eq!(scheduler.actors()[0].current_state, RUN);
    assert_eq!(scheduler.actors()[0].previous_state, NOD);
    let leader = h.leader(1).expect("bound on the first switch");
    assert!(h.slots(RUN).contains(&leader));
}
