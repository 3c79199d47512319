//! The coordinator: matches components to processors and runs ticks.
//!
//! ## Lifecycle of a match
//!
//! 1. [`Coordinator::register_component`] adds the record to the live
//!    registry and, for every processor that wants its type and is now fully
//!    satisfied, inserts a [`MatchRecord`] and queues it for initialization.
//!    Registration only ever adds matches.
//! 2. [`Coordinator::unregister_component`] removes the record from the
//!    registry and queues its owner for reconciliation. Match sets are not
//!    touched, because the caller may be a processor iterating one.
//! 3. At the start of every [`Coordinator::tick`], reconciliation purges
//!    matches for stale entities and drops matches for queued entities that
//!    no longer satisfy their processor. This is the only place matches are
//!    deleted.
//!
//! ## Tick order
//!
//! Within a phase: reconcile, initialize every pending match of every active
//! processor, process every initialized match of every active processor,
//! then drain the end-of-phase queue.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use arms_component::{CapabilityRegistry, Component, ComponentHandle, ComponentRecord, ComponentTypeId, Entity};
use tracing::{debug, info, trace, warn};

use crate::config::CoordinatorConfig;
use crate::context::PhaseContext;
use crate::deferred::{DeferredQueue, DrainReport};
use crate::descriptor::{Phase, ProcessorDescriptor};
use crate::error::{ConfigError, CoordinatorError};
use crate::match_index::{MatchIndex, MatchRecord, Resolved};
use crate::processor::{ActivityPredicate, Processor, ProcessorRegistration};
use crate::registry::ComponentRegistry;
use crate::scheduler::{self, PhaseGroups};

/// A point in the frame at which the coordinator runs code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Phase(Phase),
    FrameBoundary,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Phase(phase) => write!(f, "{phase} phase"),
            Checkpoint::FrameBoundary => f.write_str("frame boundary"),
        }
    }
}

/// Summary of one [`Coordinator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub phase: Phase,
    /// Matches removed by reconciliation.
    pub reconciled: usize,
    /// `initialize` calls made.
    pub initialized: usize,
    /// `process` calls made.
    pub processed: usize,
    /// `initialize` or `process` calls that returned an error.
    pub failures: usize,
    /// The end-of-phase queue drain.
    pub deferred: DrainReport,
}

impl TickReport {
    fn new(phase: Phase, reconciled: usize) -> Self {
        Self {
            phase,
            reconciled,
            initialized: 0,
            processed: 0,
            failures: 0,
            deferred: DrainReport::default(),
        }
    }
}

/// One instantiated processor and its match set.
struct ProcessorSlot {
    descriptor: ProcessorDescriptor,
    instance: RefCell<Box<dyn Processor>>,
    activity: Option<ActivityPredicate>,
    index: RefCell<MatchIndex>,
}

impl ProcessorSlot {
    fn is_active(&self) -> bool {
        self.activity.as_ref().is_none_or(|active| active())
    }

    fn name(&self) -> &str {
        self.descriptor.name()
    }
}

/// Resets the running checkpoint when a tick or drain ends, even on unwind.
struct CheckpointGuard<'a> {
    running: &'a Cell<Option<Checkpoint>>,
}

impl Drop for CheckpointGuard<'_> {
    fn drop(&mut self) {
        self.running.set(None);
    }
}

/// The scheduling core.
///
/// All methods take `&self`; state lives behind `RefCell`s so processors
/// can call back into the coordinator from inside a tick. The coordinator
/// is single-threaded and not `Send`.
pub struct Coordinator {
    config: CoordinatorConfig,
    /// Enabled processors, sorted by priority (stable).
    slots: Vec<ProcessorSlot>,
    phases: PhaseGroups,
    /// Slots interested in each component type, in slot order.
    by_type: HashMap<ComponentTypeId, Vec<usize>>,
    registry: RefCell<ComponentRegistry>,
    /// Owners of unregistered components awaiting reconciliation.
    removals: RefCell<VecDeque<Entity>>,
    phase_queue: DeferredQueue,
    frame_queue: DeferredQueue,
    frame: Cell<u64>,
    delta_seconds: Cell<f32>,
    running: Cell<Option<Checkpoint>>,
    blackboard: RefCell<Option<Weak<dyn Any>>>,
}

impl Coordinator {
    /// Validate every descriptor, instantiate the processors whose tag is
    /// enabled, and build the phase schedule.
    ///
    /// Descriptors for disabled tags are validated too, so a broken
    /// descriptor cannot hide behind configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`], naming the offending processor.
    pub fn new(
        config: CoordinatorConfig,
        capabilities: &CapabilityRegistry,
        registrations: Vec<ProcessorRegistration>,
    ) -> Result<Self, ConfigError> {
        let mut names = HashSet::with_capacity(registrations.len());
        for (position, registration) in registrations.iter().enumerate() {
            registration.descriptor.validate(position, capabilities)?;
            if !names.insert(registration.descriptor.name().to_string()) {
                return Err(ConfigError::DuplicateProcessor {
                    processor: registration.descriptor.name().to_string(),
                });
            }
        }

        let total = registrations.len();
        let mut enabled: Vec<ProcessorRegistration> = registrations
            .into_iter()
            .filter(|r| {
                let keep = config.is_enabled(r.descriptor.tag());
                if !keep {
                    debug!(
                        processor = r.descriptor.name(),
                        tag = r.descriptor.tag(),
                        "processor tag not enabled, skipping"
                    );
                }
                keep
            })
            .collect();
        enabled.sort_by_key(|r| r.descriptor.priority());

        let slots: Vec<ProcessorSlot> = enabled
            .into_iter()
            .map(|r| ProcessorSlot {
                instance: RefCell::new((r.factory)()),
                descriptor: r.descriptor,
                activity: r.activity,
                index: RefCell::new(MatchIndex::new()),
            })
            .collect();

        let descriptors: Vec<&ProcessorDescriptor> = slots.iter().map(|s| &s.descriptor).collect();
        let phases = scheduler::compute_phase_groups(&descriptors);

        let mut by_type: HashMap<ComponentTypeId, Vec<usize>> = HashMap::new();
        for (idx, slot) in slots.iter().enumerate() {
            if slot.descriptor.required().is_empty() {
                warn!(
                    processor = slot.name(),
                    "processor requires no components and will never match"
                );
            }
            for &type_id in slot.descriptor.required() {
                by_type.entry(type_id).or_default().push(idx);
            }
        }

        info!(
            pre_tick = phases.group(Phase::PreTick).len(),
            tick = phases.group(Phase::Tick).len(),
            post_tick = phases.group(Phase::PostTick).len(),
            skipped = total - slots.len(),
            tags = ?config.enabled_tags,
            "coordinator ready"
        );

        Ok(Self {
            config,
            slots,
            phases,
            by_type,
            registry: RefCell::new(ComponentRegistry::new()),
            removals: RefCell::new(VecDeque::new()),
            phase_queue: DeferredQueue::new("end_of_phase"),
            frame_queue: DeferredQueue::new("end_of_frame"),
            frame: Cell::new(0),
            delta_seconds: Cell::new(0.0),
            running: Cell::new(None),
            blackboard: RefCell::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // ── Component lifecycle ─────────────────────────────────────────────

    /// Register a component and add any matches it completes.
    ///
    /// Registering the same record twice is harmless. Components owned by a
    /// stale entity are ignored.
    pub fn register_component(&self, component: &ComponentHandle) {
        let owner = component.owner();
        if !owner.is_alive() {
            debug!(
                component = component.type_name(),
                entity = %owner,
                "ignoring component of destroyed entity"
            );
            return;
        }

        if !self.registry.borrow_mut().register(component.clone()) {
            trace!(component = component.type_name(), entity = %owner, "component already registered");
        }

        let Some(interested) = self.by_type.get(&ComponentRecord::type_id(component)) else {
            return;
        };

        let registry = self.registry.borrow();
        for &idx in interested {
            let slot = &self.slots[idx];
            if !Self::satisfies(&slot.descriptor, owner, &registry) {
                continue;
            }

            let mut index = slot.index.borrow_mut();
            let existing = index.get(owner).map(|r| r.resolved().is_current(&registry));
            if existing == Some(true) {
                continue;
            }
            let Some(resolved) = Resolved::resolve(owner, slot.descriptor.required(), &registry) else {
                continue;
            };
            let record = MatchRecord::new(owner.clone(), resolved);
            if existing.is_some() {
                index.refresh(record);
                trace!(processor = slot.name(), entity = %owner, "refreshed resolved components");
            } else if index.insert(record) {
                debug!(processor = slot.name(), entity = %owner, "entity matched");
            }
        }
    }

    /// Remove a component from the live registry and queue its owner for
    /// reconciliation at the start of the next tick.
    pub fn unregister_component(&self, component: &ComponentHandle) {
        if !self.registry.borrow_mut().unregister(component) {
            trace!(
                component = component.type_name(),
                entity = %component.owner(),
                "unregistering a component that was not registered"
            );
        }
        self.removals.borrow_mut().push_back(component.owner().clone());
    }

    /// Returns `true` if `entity` is alive and holds an enabled component of
    /// every type `descriptor` requires.
    fn satisfies(descriptor: &ProcessorDescriptor, entity: &Entity, registry: &ComponentRegistry) -> bool {
        entity.is_alive()
            && descriptor
                .required()
                .iter()
                .all(|&type_id| registry.has_enabled(entity, type_id))
    }

    /// The matching predicate for the processor named `processor`, evaluated
    /// now. `None` if no such processor is instantiated.
    #[must_use]
    pub fn is_interested(&self, processor: &str, entity: &Entity) -> Option<bool> {
        let slot = self.slot(processor)?;
        Some(Self::satisfies(&slot.descriptor, entity, &self.registry.borrow()))
    }

    /// Drain the removal queue and drop matches that no longer hold.
    ///
    /// Runs automatically at the start of every tick; a no-op when nothing
    /// was unregistered. Returns the number of matches removed.
    pub fn reconcile(&self) -> usize {
        let queued: Vec<Entity> = self.removals.borrow_mut().drain(..).collect();
        if queued.is_empty() {
            return 0;
        }

        let mut removed = 0;
        let purged_components = self.registry.borrow_mut().purge_stale_owners();
        for slot in &self.slots {
            removed += slot.index.borrow_mut().purge_stale();
        }

        let registry = self.registry.borrow();
        let mut seen = HashSet::with_capacity(queued.len());
        for entity in queued.iter().filter(|e| seen.insert(e.id())) {
            for slot in &self.slots {
                let mut index = slot.index.borrow_mut();
                let Some(current) = index.get(entity).map(|r| r.resolved().is_current(&registry)) else {
                    continue;
                };

                if !Self::satisfies(&slot.descriptor, entity, &registry) {
                    index.remove(entity);
                    removed += 1;
                    debug!(processor = slot.name(), entity = %entity, "entity unmatched");
                } else if !current {
                    if let Some(resolved) = Resolved::resolve(entity, slot.descriptor.required(), &registry) {
                        index.refresh(MatchRecord::new(entity.clone(), resolved));
                    }
                }
            }
        }

        trace!(
            entities = seen.len(),
            removed,
            purged_components,
            "reconciled match sets"
        );
        removed
    }

    // ── Driving ─────────────────────────────────────────────────────────

    /// Advance the frame counter and set the delta exposed to processors.
    /// Returns the new frame number.
    pub fn begin_frame(&self, delta_seconds: f32) -> u64 {
        let frame = self.frame.get() + 1;
        self.frame.set(frame);
        self.delta_seconds.set(delta_seconds);
        frame
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame.get()
    }

    /// Run one phase.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Reentrant`] if called while a tick or frame
    /// boundary is already running.
    pub fn tick(&self, phase: Phase) -> Result<TickReport, CoordinatorError> {
        let _guard = self.enter("tick", Checkpoint::Phase(phase))?;

        let mut report = TickReport::new(phase, self.reconcile());
        let ctx = PhaseContext::new(self, phase, self.frame.get(), self.delta_seconds.get());

        // Activity is sampled once so both passes see the same processors.
        let active: Vec<&ProcessorSlot> = self
            .phases
            .group(phase)
            .iter()
            .map(|&idx| &self.slots[idx])
            .filter(|slot| slot.is_active())
            .collect();

        for slot in &active {
            let pending = slot.index.borrow_mut().take_pending();
            if pending.is_empty() {
                continue;
            }
            let mut processor = slot.instance.borrow_mut();
            for record in pending.iter().filter(|r| r.entity().is_alive()) {
                report.initialized += 1;
                if let Err(err) = processor.initialize(&ctx, record.entity(), record.resolved()) {
                    report.failures += 1;
                    warn!(
                        processor = slot.name(),
                        entity = %record.entity(),
                        error = %format!("{err:#}"),
                        "initialize failed"
                    );
                }
            }
        }

        for slot in &active {
            // Snapshot: matches added while processing are picked up next tick.
            let records = slot.index.borrow().initialized();
            let mut processor = slot.instance.borrow_mut();
            for record in records.iter().filter(|r| r.entity().is_alive()) {
                report.processed += 1;
                if let Err(err) = processor.process(&ctx, record.entity(), record.resolved()) {
                    report.failures += 1;
                    warn!(
                        processor = slot.name(),
                        entity = %record.entity(),
                        error = %format!("{err:#}"),
                        "process failed"
                    );
                }
            }
        }

        report.deferred = self.phase_queue.drain();

        debug!(
            %phase,
            frame = ctx.frame(),
            active = active.len(),
            reconciled = report.reconciled,
            initialized = report.initialized,
            processed = report.processed,
            failures = report.failures,
            deferred = report.deferred.executed,
            "phase complete"
        );
        Ok(report)
    }

    /// Signal the end of the frame and drain the end-of-frame queue.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Reentrant`] if called from inside a tick.
    pub fn on_frame_boundary(&self) -> Result<DrainReport, CoordinatorError> {
        let _guard = self.enter("on_frame_boundary", Checkpoint::FrameBoundary)?;
        Ok(self.frame_queue.drain())
    }

    fn enter(&self, call: &'static str, checkpoint: Checkpoint) -> Result<CheckpointGuard<'_>, CoordinatorError> {
        if let Some(running) = self.running.get() {
            return Err(CoordinatorError::Reentrant { call, running });
        }
        self.running.set(Some(checkpoint));
        Ok(CheckpointGuard {
            running: &self.running,
        })
    }

    // ── Deferred actions ────────────────────────────────────────────────

    /// Queue `action` for the end of the phase currently running, or of the
    /// next phase to run if none is.
    pub fn run_at_end_of_current_phase<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.phase_queue.push(action);
    }

    /// Queue `action` for the next frame boundary.
    pub fn run_at_end_of_frame<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.frame_queue.push(action);
    }

    // ── Blackboard ──────────────────────────────────────────────────────

    /// Attach a shared object processors can fetch through
    /// [`PhaseContext::blackboard`]. Only a weak reference is kept.
    pub fn set_blackboard<T: 'static>(&self, value: &Rc<T>) {
        let shared: Rc<dyn Any> = value.clone();
        *self.blackboard.borrow_mut() = Some(Rc::downgrade(&shared));
    }

    /// The attached blackboard, if it is a `T` and still alive.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::MissingBlackboard`] otherwise.
    pub fn blackboard<T: 'static>(&self) -> Result<Rc<T>, CoordinatorError> {
        self.blackboard
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|shared| shared.downcast::<T>().ok())
            .ok_or(CoordinatorError::MissingBlackboard(std::any::type_name::<T>()))
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Snapshot of every live record of `type_id`.
    #[must_use]
    pub fn components_of_type(&self, type_id: ComponentTypeId) -> Vec<ComponentHandle> {
        self.registry.borrow().of_type(type_id)
    }

    /// Snapshot of every live record of component type `T`.
    #[must_use]
    pub fn components_of<T: Component>(&self) -> Vec<ComponentHandle> {
        self.components_of_type(T::component_type_id())
    }

    #[must_use]
    pub fn live_component_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Entities that own at least one live component.
    #[must_use]
    pub fn live_entity_count(&self) -> usize {
        self.registry.borrow().entity_count()
    }

    /// Entities queued for reconciliation.
    #[must_use]
    pub fn pending_removals(&self) -> usize {
        self.removals.borrow().len()
    }

    /// Entities currently matched by `processor`, in match order.
    #[must_use]
    pub fn matched_entities(&self, processor: &str) -> Option<Vec<Entity>> {
        self.slot(processor).map(|s| s.index.borrow().entities())
    }

    /// Matches of `processor` still awaiting initialization.
    #[must_use]
    pub fn pending_initializations(&self, processor: &str) -> Option<usize> {
        self.slot(processor).map(|s| s.index.borrow().pending_len())
    }

    /// Names of the processors scheduled in `phase`, in execution order.
    #[must_use]
    pub fn processor_names(&self, phase: Phase) -> Vec<&str> {
        self.phases
            .group(phase)
            .iter()
            .map(|&idx| self.slots[idx].name())
            .collect()
    }

    /// Number of instantiated processors.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, name: &str) -> Option<&ProcessorSlot> {
        self.slots.iter().find(|s| s.name() == name)
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("processors", &self.slots.len())
            .field("live_components", &self.live_component_count())
            .field("pending_removals", &self.pending_removals())
            .field("frame", &self.frame.get())
            .field("running", &self.running.get())
            .finish_non_exhaustive()
    }
}
