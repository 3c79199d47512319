//! Whole-frame scenarios driven through `FrameLoop` and `World`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arms_builtin::{
    ContinuousMovement, Expirable, Transform, World, builtin_processors, register_builtin_capabilities,
};
use arms_component::{CapabilityRegistry, Component, Entity};
use arms_coordinator::{
    Coordinator, CoordinatorConfig, FrameConfig, FrameLoop, Phase, PhaseContext, Processor, ProcessorDescriptor,
    ProcessorRegistration, Resolved,
};
use glam::Vec3;

#[derive(Debug, Default)]
struct Score(u32);

impl Component for Score {
    fn type_name() -> &'static str {
        "Score"
    }
}

type Trace = Rc<RefCell<Vec<String>>>;

/// Logs `name:phase:entity` for every call.
struct Tracer {
    name: &'static str,
    trace: Trace,
}

impl Processor for Tracer {
    fn initialize(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, _: &Resolved) -> anyhow::Result<()> {
        self.trace
            .borrow_mut()
            .push(format!("{}:init:{}:{}", self.name, ctx.phase(), entity.id()));
        Ok(())
    }

    fn process(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, _: &Resolved) -> anyhow::Result<()> {
        self.trace
            .borrow_mut()
            .push(format!("{}:{}:{}", self.name, ctx.phase(), entity.id()));
        Ok(())
    }
}

fn tracer(name: &'static str, phase: Phase, priority: i32, trace: &Trace) -> ProcessorRegistration {
    let trace = trace.clone();
    ProcessorRegistration::new(
        ProcessorDescriptor::new(name)
            .requires::<Score>()
            .in_phase(phase)
            .with_priority(priority),
        move || Tracer { name, trace },
    )
}

fn make_capabilities() -> CapabilityRegistry {
    let mut caps = CapabilityRegistry::new();
    register_builtin_capabilities(&mut caps).unwrap();
    caps.register::<Score>().unwrap();
    caps
}

fn make_frame_loop(config: CoordinatorConfig, extra: Vec<ProcessorRegistration>) -> (FrameLoop, Rc<World>) {
    let mut registrations = builtin_processors();
    registrations.extend(extra);
    let coordinator = Rc::new(Coordinator::new(config, &make_capabilities(), registrations).unwrap());
    let world = World::install(coordinator.clone());
    (FrameLoop::new(coordinator, FrameConfig::default()), world)
}

fn drain(trace: &Trace) -> Vec<String> {
    trace.borrow_mut().drain(..).collect()
}

#[test]
fn phases_run_in_order_with_priorities() {
    let trace = Trace::default();
    let (frame_loop, world) = make_frame_loop(
        CoordinatorConfig::default(),
        vec![
            tracer("late", Phase::PostTick, 0, &trace),
            tracer("second", Phase::Tick, 5, &trace),
            tracer("first", Phase::Tick, -5, &trace),
        ],
    );
    let e = world.spawn();
    world.attach(&e, Score::default()).unwrap();

    frame_loop.run_frame(0.016).unwrap();
    let id = e.id();
    assert_eq!(
        drain(&trace),
        vec![
            format!("first:init:tick:{id}"),
            format!("second:init:tick:{id}"),
            format!("first:tick:{id}"),
            format!("second:tick:{id}"),
            format!("late:init:post_tick:{id}"),
            format!("late:post_tick:{id}"),
        ]
    );
}

#[test]
fn entity_expires_mid_frame_and_disappears_from_later_phases() {
    let trace = Trace::default();
    let (frame_loop, world) =
        make_frame_loop(CoordinatorConfig::default(), vec![tracer("watch", Phase::Tick, 0, &trace)]);
    let e = world.spawn();
    world.attach(&e, Score::default()).unwrap();
    world.attach(&e, Expirable::after(0.05)).unwrap();

    frame_loop.run_frame(0.03).unwrap();
    let id = e.id();
    assert_eq!(drain(&trace), vec![format!("watch:init:tick:{id}"), format!("watch:tick:{id}")]);

    // Expires during PreTick; destroyed at the end of PreTick.
    let report = frame_loop.run_frame(0.03).unwrap();
    assert!(!e.is_alive());
    assert!(drain(&trace).is_empty());
    // Both the watcher's and the expirable's matches are purged.
    assert_eq!(report.phases[1].reconciled, 2);
    assert_eq!(report.failure_count(), 0);
}

#[test]
fn movement_accumulates_over_frames() {
    let (frame_loop, world) = make_frame_loop(CoordinatorConfig::default(), Vec::new());
    let e = world.spawn();
    let transform = world.attach(&e, Transform::default()).unwrap();
    world.attach(&e, ContinuousMovement::new(Vec3::Z, 10.0)).unwrap();

    for _ in 0..4 {
        frame_loop.run_frame(0.25).unwrap();
    }
    let position = transform.get::<Transform>().unwrap().position;
    assert!(position.abs_diff_eq(Vec3::new(0.0, 0.0, 10.0), 1e-4));
}

/// Spawns one scored entity per frame at the frame boundary.
struct Spawner {
    spawned: Rc<Cell<u32>>,
}

impl Processor for Spawner {
    fn process(&mut self, ctx: &PhaseContext<'_>, _: &Entity, _: &Resolved) -> anyhow::Result<()> {
        let world = ctx.blackboard::<World>()?;
        let spawned = self.spawned.clone();
        world.spawn_at_end_of_frame(move |world, entity| {
            world.attach(entity, Score(spawned.get()))?;
            spawned.set(spawned.get() + 1);
            Ok(())
        });
        Ok(())
    }
}

#[test]
fn spawned_entities_match_from_next_frame() {
    let trace = Trace::default();
    let spawned = Rc::new(Cell::new(0));
    let s = spawned.clone();
    let (frame_loop, world) = make_frame_loop(
        CoordinatorConfig::default(),
        vec![
            ProcessorRegistration::new(
                ProcessorDescriptor::new("spawner").requires::<Transform>(),
                move || Spawner { spawned: s },
            ),
            tracer("scores", Phase::PostTick, 0, &trace),
        ],
    );
    let root = world.spawn();
    world.attach(&root, Transform::default()).unwrap();

    frame_loop.run_frame(0.016).unwrap();
    assert_eq!(spawned.get(), 1);
    assert!(drain(&trace).is_empty());

    let id = world
        .entities()
        .into_iter()
        .find(|e| *e != root)
        .map(|e| e.id())
        .unwrap();
    frame_loop.run_frame(0.016).unwrap();
    assert_eq!(spawned.get(), 2);
    assert_eq!(
        drain(&trace),
        vec![format!("scores:init:post_tick:{id}"), format!("scores:post_tick:{id}")]
    );
    assert_eq!(world.entity_count(), 3);
}

#[test]
fn tagged_processors_follow_config() {
    let trace = Trace::default();
    let debug_only = |trace: &Trace| {
        let trace = trace.clone();
        ProcessorRegistration::new(
            ProcessorDescriptor::new("debug_overlay")
                .requires::<Score>()
                .with_tag("Debug"),
            move || Tracer {
                name: "debug_overlay",
                trace,
            },
        )
    };

    let (frame_loop, world) = make_frame_loop(CoordinatorConfig::default(), vec![debug_only(&trace)]);
    let e = world.spawn();
    world.attach(&e, Score::default()).unwrap();
    frame_loop.run_frame(0.016).unwrap();
    assert!(drain(&trace).is_empty());

    let config = CoordinatorConfig::parse_tag_list("Untagged, Debug");
    let (frame_loop, world) = make_frame_loop(config, vec![debug_only(&trace)]);
    let e = world.spawn();
    world.attach(&e, Score::default()).unwrap();
    frame_loop.run_frame(0.016).unwrap();
    assert_eq!(drain(&trace).len(), 2);
}

#[test]
fn disabling_mid_session_stops_processing_next_tick() {
    let trace = Trace::default();
    let (frame_loop, world) =
        make_frame_loop(CoordinatorConfig::default(), vec![tracer("watch", Phase::Tick, 0, &trace)]);
    let e = world.spawn();
    let score = world.attach(&e, Score::default()).unwrap();

    frame_loop.run_frame(0.016).unwrap();
    drain(&trace);

    world.set_enabled(&score, false).unwrap();
    frame_loop.run_frame(0.016).unwrap();
    assert!(drain(&trace).is_empty());

    // Re-enabling matches again and re-initializes.
    world.set_enabled(&score, true).unwrap();
    frame_loop.run_frame(0.016).unwrap();
    let id = e.id();
    assert_eq!(drain(&trace), vec![format!("watch:init:tick:{id}"), format!("watch:tick:{id}")]);
}
