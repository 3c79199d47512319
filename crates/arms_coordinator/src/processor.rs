//! The processor capability and its startup registration.
//!
//! Processors are behavior units matched to entities by the component types
//! their [`ProcessorDescriptor`] requires. The coordinator hands each call
//! the entity and its [`Resolved`] components in required order.

use arms_component::Entity;

use crate::context::PhaseContext;
use crate::descriptor::ProcessorDescriptor;
use crate::match_index::Resolved;

/// Behavior run against every matching entity.
pub trait Processor {
    /// Called once per match, before the first [`Processor::process`] call
    /// for that entity.
    ///
    /// # Errors
    ///
    /// A failure is logged and counted; it does not stop the pass.
    fn initialize(
        &mut self,
        _ctx: &PhaseContext<'_>,
        _entity: &Entity,
        _components: &Resolved,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per tick of this processor's phase for every match.
    ///
    /// # Errors
    ///
    /// A failure is logged and counted; it does not stop the pass.
    fn process(
        &mut self,
        ctx: &PhaseContext<'_>,
        entity: &Entity,
        components: &Resolved,
    ) -> anyhow::Result<()>;
}

/// Builds a processor instance at startup.
pub type ProcessorFactory = Box<dyn FnOnce() -> Box<dyn Processor>>;

/// Decides each tick whether a processor runs.
pub type ActivityPredicate = Box<dyn Fn() -> bool>;

/// A descriptor paired with the factory that builds its processor.
pub struct ProcessorRegistration {
    pub(crate) descriptor: ProcessorDescriptor,
    pub(crate) factory: ProcessorFactory,
    pub(crate) activity: Option<ActivityPredicate>,
}

impl ProcessorRegistration {
    /// Pair `descriptor` with a factory. The factory only runs if the
    /// descriptor's tag is enabled.
    #[must_use]
    pub fn new<P, F>(descriptor: ProcessorDescriptor, factory: F) -> Self
    where
        P: Processor + 'static,
        F: FnOnce() -> P + 'static,
    {
        Self {
            descriptor,
            factory: Box::new(move || Box::new(factory()) as Box<dyn Processor>),
            activity: None,
        }
    }

    /// Attach an activity predicate. While it returns `false` the processor
    /// is skipped but its match set is still maintained.
    #[must_use]
    pub fn with_activity(mut self, predicate: impl Fn() -> bool + 'static) -> Self {
        self.activity = Some(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn descriptor(&self) -> &ProcessorDescriptor {
        &self.descriptor
    }
}

impl std::fmt::Debug for ProcessorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistration")
            .field("descriptor", &self.descriptor)
            .field("has_activity", &self.activity.is_some())
            .finish_non_exhaustive()
    }
}
