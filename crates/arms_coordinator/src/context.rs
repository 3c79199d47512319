//! Per-tick context handed to processors.

use std::rc::Rc;

use arms_component::{Component, ComponentHandle};

use crate::coordinator::Coordinator;
use crate::descriptor::Phase;
use crate::error::CoordinatorError;

/// What a processor can see and do during [`Processor::initialize`] and
/// [`Processor::process`].
///
/// Structural changes go through the coordinator: registration is applied
/// immediately, while removals only take effect at the next reconciliation.
/// Destroying or spawning should be deferred with
/// [`PhaseContext::run_at_end_of_current_phase`] or
/// [`PhaseContext::run_at_end_of_frame`].
///
/// [`Processor::initialize`]: crate::Processor::initialize
/// [`Processor::process`]: crate::Processor::process
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    coordinator: &'a Coordinator,
    phase: Phase,
    frame: u64,
    delta_seconds: f32,
}

impl<'a> PhaseContext<'a> {
    pub(crate) fn new(coordinator: &'a Coordinator, phase: Phase, frame: u64, delta_seconds: f32) -> Self {
        Self {
            coordinator,
            phase,
            frame,
            delta_seconds,
        }
    }

    /// The phase currently running.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The frame counter set by [`Coordinator::begin_frame`].
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds elapsed since the previous frame.
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta_seconds
    }

    #[must_use]
    pub fn coordinator(&self) -> &'a Coordinator {
        self.coordinator
    }

    /// Queue `action` to run once every processor in this phase has finished.
    pub fn run_at_end_of_current_phase<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.coordinator.run_at_end_of_current_phase(action);
    }

    /// Queue `action` to run at the next frame boundary.
    pub fn run_at_end_of_frame<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.coordinator.run_at_end_of_frame(action);
    }

    pub fn register_component(&self, component: &ComponentHandle) {
        self.coordinator.register_component(component);
    }

    pub fn unregister_component(&self, component: &ComponentHandle) {
        self.coordinator.unregister_component(component);
    }

    /// Snapshot of every live record of component type `T`.
    #[must_use]
    pub fn components_of<T: Component>(&self) -> Vec<ComponentHandle> {
        self.coordinator.components_of::<T>()
    }

    /// The shared object attached with [`Coordinator::set_blackboard`].
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::MissingBlackboard`] if none of type `T` is attached.
    pub fn blackboard<T: 'static>(&self) -> Result<Rc<T>, CoordinatorError> {
        self.coordinator.blackboard::<T>()
    }
}
