//! The demo scene: an emitter that fires short-lived projectiles.

use std::cell::Cell;
use std::rc::Rc;

use arms_builtin::{ContinuousMovement, DelayedAction, Expirable, Transform, World};
use arms_component::{CapabilityError, CapabilityRegistry, Component, Entity};
use arms_coordinator::{Phase, PhaseContext, Processor, ProcessorDescriptor, ProcessorRegistration, Resolved};
use glam::{Quat, Vec3};
use tracing::{debug, info};

/// Tag of processors that only run when debugging is enabled.
pub const DEBUG_TAG: &str = "Debug";

/// Fires a projectile every `interval` seconds.
#[derive(Debug, Clone)]
pub struct Emitter {
    pub interval: f32,
    pub elapsed: f32,
    pub speed: f32,
    pub lifetime: f32,
    /// Degrees the emitter turns after each shot.
    pub sweep_degrees: f32,
    pub fired: u32,
}

impl Component for Emitter {
    fn type_name() -> &'static str {
        "Emitter"
    }
}

/// Marks entities spawned by an [`Emitter`].
#[derive(Debug, Clone, Copy)]
pub struct Projectile {
    pub serial: u32,
}

impl Component for Projectile {
    fn type_name() -> &'static str {
        "Projectile"
    }
}

pub fn register_capabilities(capabilities: &mut CapabilityRegistry) -> Result<(), CapabilityError> {
    capabilities.register::<Emitter>()?;
    capabilities.register::<Projectile>()?;
    Ok(())
}

/// Requires `[Emitter, Transform]`.
struct EmitterProcessor;

impl Processor for EmitterProcessor {
    fn process(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let mut emitter = components.get_mut::<Emitter>(0)?;
        emitter.elapsed += ctx.delta_seconds();
        if emitter.elapsed < emitter.interval {
            return Ok(());
        }
        emitter.elapsed -= emitter.interval;
        emitter.fired += 1;

        let mut transform = components.get_mut::<Transform>(1)?;
        let origin = *transform;
        transform.rotation = Quat::from_rotation_y(emitter.sweep_degrees.to_radians()) * transform.rotation;

        let serial = emitter.fired;
        let (speed, lifetime) = (emitter.speed, emitter.lifetime);
        debug!(%entity, serial, "emitting projectile");

        ctx.blackboard::<World>()?.spawn_at_end_of_frame(move |world, projectile| {
            world.attach(projectile, origin)?;
            world.attach(projectile, ContinuousMovement::new(Vec3::NEG_Z, speed))?;
            world.attach(projectile, Expirable::after(lifetime))?;
            world.attach(projectile, Projectile { serial })?;
            Ok(())
        });
        Ok(())
    }
}

/// Logs projectile positions. Requires `[Projectile, Transform]`.
struct ProjectileReporter;

impl Processor for ProjectileReporter {
    fn initialize(&mut self, _ctx: &PhaseContext<'_>, entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let serial = components.get::<Projectile>(0)?.serial;
        info!(%entity, serial, "projectile launched");
        Ok(())
    }

    fn process(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let position = components.get::<Transform>(1)?.position;
        debug!(frame = ctx.frame(), %entity, x = position.x, y = position.y, z = position.z, "projectile");
        Ok(())
    }
}

/// Processors defined by the demo scene.
pub fn processors() -> Vec<ProcessorRegistration> {
    vec![
        ProcessorRegistration::new(
            ProcessorDescriptor::new("EmitterProcessor")
                .requires::<Emitter>()
                .requires::<Transform>()
                .in_phase(Phase::Tick),
            || EmitterProcessor,
        ),
        ProcessorRegistration::new(
            ProcessorDescriptor::new("ProjectileReporter")
                .requires::<Projectile>()
                .requires::<Transform>()
                .in_phase(Phase::PostTick)
                .with_tag(DEBUG_TAG),
            || ProjectileReporter,
        ),
    ]
}

/// Spawn the emitter and a warm-up timer that flips `warmed_up` when done.
pub fn populate(world: &World, warmed_up: Rc<Cell<bool>>) -> anyhow::Result<Entity> {
    let emitter = world.spawn();
    world.attach(&emitter, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))?;
    world.attach(
        &emitter,
        Emitter {
            interval: 0.25,
            elapsed: 0.0,
            speed: 8.0,
            lifetime: 1.0,
            sweep_degrees: 30.0,
            fired: 0,
        },
    )?;
    world.attach(
        &emitter,
        DelayedAction::new(0.5).on_complete(move || {
            info!("warm-up complete");
            warmed_up.set(true);
        }),
    )?;
    Ok(emitter)
}
