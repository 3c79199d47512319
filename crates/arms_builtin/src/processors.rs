//! Built-in processors.
//!
//! All of them run in [`Phase::PreTick`] under the default tag.

use arms_component::{CapabilityError, CapabilityRegistry, Entity};
use arms_coordinator::{Phase, PhaseContext, Processor, ProcessorDescriptor, ProcessorRegistration, Resolved};
use tracing::{debug, trace};

use crate::components::{ContinuousMovement, DelayedAction, Expirable, Transform};
use crate::world::World;

/// Moves the transform along the movement direction in local space.
///
/// Requires `[ContinuousMovement, Transform]`.
#[derive(Debug, Default)]
pub struct ContinuousMovementProcessor;

impl ContinuousMovementProcessor {
    pub const NAME: &'static str = "ContinuousMovementProcessor";

    #[must_use]
    pub fn descriptor() -> ProcessorDescriptor {
        ProcessorDescriptor::new(Self::NAME)
            .requires::<ContinuousMovement>()
            .requires::<Transform>()
            .in_phase(Phase::PreTick)
    }
}

impl Processor for ContinuousMovementProcessor {
    fn process(&mut self, ctx: &PhaseContext<'_>, _entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let offset = components
            .get::<ContinuousMovement>(0)?
            .displacement(ctx.delta_seconds());
        components.get_mut::<Transform>(1)?.translate_local(offset);
        Ok(())
    }
}

/// Counts down [`Expirable::time_remaining`] and destroys the target at the
/// end of the phase once it runs out.
///
/// Requires `[Expirable]`.
#[derive(Debug, Default)]
pub struct ExpirableProcessor;

impl ExpirableProcessor {
    pub const NAME: &'static str = "ExpirableProcessor";

    #[must_use]
    pub fn descriptor() -> ProcessorDescriptor {
        ProcessorDescriptor::new(Self::NAME)
            .requires::<Expirable>()
            .in_phase(Phase::PreTick)
    }
}

impl Processor for ExpirableProcessor {
    fn initialize(&mut self, _ctx: &PhaseContext<'_>, entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let mut expirable = components.get_mut::<Expirable>(0)?;
        if expirable.target.is_none() {
            expirable.target = Some(entity.clone());
        }
        Ok(())
    }

    fn process(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, components: &Resolved) -> anyhow::Result<()> {
        let target = {
            let mut expirable = components.get_mut::<Expirable>(0)?;
            expirable.time_remaining -= ctx.delta_seconds();
            if !expirable.is_expired() {
                return Ok(());
            }
            expirable.target.clone().unwrap_or_else(|| entity.clone())
        };

        debug!(%entity, %target, "expired");
        ctx.blackboard::<World>()?.destroy_at_end_of_phase(&target);
        Ok(())
    }
}

/// Drives every running [`DelayedAction`] on the entity.
///
/// Requires `[DelayedAction]`.
#[derive(Debug, Default)]
pub struct DelayedActionProcessor;

impl DelayedActionProcessor {
    pub const NAME: &'static str = "DelayedActionProcessor";

    #[must_use]
    pub fn descriptor() -> ProcessorDescriptor {
        ProcessorDescriptor::new(Self::NAME)
            .requires::<DelayedAction>()
            .in_phase(Phase::PreTick)
    }
}

impl Processor for DelayedActionProcessor {
    fn process(&mut self, ctx: &PhaseContext<'_>, entity: &Entity, _components: &Resolved) -> anyhow::Result<()> {
        let world = ctx.blackboard::<World>()?;

        for handle in world.components_of::<DelayedAction>(entity) {
            if !handle.is_enabled() {
                continue;
            }

            // Callbacks run with the payload released so they may touch it.
            let (update, complete) = {
                let mut action = handle.get_mut::<DelayedAction>()?;
                if !action.running {
                    continue;
                }
                action.delay -= ctx.delta_seconds();
                if action.delay > 0.0 {
                    (action.on_update.take(), None)
                } else {
                    action.running = false;
                    (None, Some(action.on_complete.take()))
                }
            };

            if let Some(mut update) = update {
                update();
                handle.get_mut::<DelayedAction>()?.on_update.get_or_insert(update);
            }

            if let Some(complete) = complete {
                if let Some(complete) = complete {
                    complete();
                }
                trace!(%entity, "delayed action complete");
                world.detach_at_end_of_phase(&handle);
            }
        }
        Ok(())
    }
}

/// Registrations for every built-in processor.
#[must_use]
pub fn builtin_processors() -> Vec<ProcessorRegistration> {
    vec![
        ProcessorRegistration::new(ContinuousMovementProcessor::descriptor(), ContinuousMovementProcessor::default),
        ProcessorRegistration::new(ExpirableProcessor::descriptor(), ExpirableProcessor::default),
        ProcessorRegistration::new(DelayedActionProcessor::descriptor(), DelayedActionProcessor::default),
    ]
}

/// Add every built-in component type to `capabilities`.
///
/// # Errors
///
/// [`CapabilityError::Collision`] if a host type already uses one of the
/// built-in names' ids.
pub fn register_builtin_capabilities(capabilities: &mut CapabilityRegistry) -> Result<(), CapabilityError> {
    capabilities.register::<Transform>()?;
    capabilities.register::<ContinuousMovement>()?;
    capabilities.register::<Expirable>()?;
    capabilities.register::<DelayedAction>()?;
    Ok(())
}
