//! Host object model.
//!
//! The [`World`] owns entity lifetime and forwards every attach, detach,
//! enable and destroy to the coordinator. Processors reach it through the
//! coordinator blackboard:
//!
//! ```rust,ignore
//! let world = ctx.blackboard::<World>()?;
//! world.destroy_at_end_of_phase(entity);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use arms_component::{Component, ComponentHandle, ComponentRecord, Entity, EntityAllocator, EntityOwner};
use arms_coordinator::Coordinator;
use tracing::{debug, trace};

/// Errors raised by [`World`] operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity was never spawned here or has been destroyed.
    #[error("entity {0} does not exist")]
    UnknownEntity(u64),

    /// The component is not attached to its owner in this world.
    #[error("component `{component}` is not attached to entity {entity}")]
    NotAttached {
        component: &'static str,
        entity: u64,
    },

    /// A deferred action outlived the world.
    #[error("the world has been dropped")]
    Dropped,
}

/// An entity owner and every component attached to it.
#[derive(Debug)]
struct Slot {
    owner: EntityOwner,
    components: Vec<ComponentHandle>,
}

/// The entities and components known to one coordinator.
#[derive(Debug)]
pub struct World {
    coordinator: Rc<Coordinator>,
    allocator: RefCell<EntityAllocator>,
    entities: RefCell<BTreeMap<u64, Slot>>,
    this: Weak<World>,
}

impl World {
    /// Create a world bound to `coordinator` and attach it as the
    /// coordinator's blackboard.
    #[must_use]
    pub fn install(coordinator: Rc<Coordinator>) -> Rc<Self> {
        let world = Rc::new_cyclic(|this| Self {
            coordinator,
            allocator: RefCell::new(EntityAllocator::new()),
            entities: RefCell::new(BTreeMap::new()),
            this: this.clone(),
        });
        world.coordinator.set_blackboard(&world);
        world
    }

    #[must_use]
    pub fn coordinator(&self) -> &Rc<Coordinator> {
        &self.coordinator
    }

    /// Allocate a new entity with no components.
    pub fn spawn(&self) -> Entity {
        let owner = self.allocator.borrow_mut().allocate();
        let entity = owner.handle();
        self.entities.borrow_mut().insert(
            entity.id(),
            Slot {
                owner,
                components: Vec::new(),
            },
        );
        trace!(%entity, "spawned");
        entity
    }

    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.borrow().contains_key(&entity.id())
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.borrow().len()
    }

    /// Every live entity, in spawn order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.borrow().values().map(|s| s.owner.handle()).collect()
    }

    /// Attach `value` to `entity` and register it with the coordinator.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if `entity` is not alive in this world.
    pub fn attach<T: Component>(&self, entity: &Entity, value: T) -> Result<ComponentHandle, WorldError> {
        let component = ComponentRecord::new(entity.clone(), value);
        self.push(entity, &component)?;
        self.coordinator.register_component(&component);
        Ok(component)
    }

    /// Attach `value` disabled. It is invisible to processors until
    /// [`World::set_enabled`] turns it on.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if `entity` is not alive in this world.
    pub fn attach_disabled<T: Component>(&self, entity: &Entity, value: T) -> Result<ComponentHandle, WorldError> {
        let component = ComponentRecord::new_disabled(entity.clone(), value);
        self.push(entity, &component)?;
        Ok(component)
    }

    fn push(&self, entity: &Entity, component: &ComponentHandle) -> Result<(), WorldError> {
        let mut entities = self.entities.borrow_mut();
        let slot = entities
            .get_mut(&entity.id())
            .ok_or(WorldError::UnknownEntity(entity.id()))?;
        slot.components.push(component.clone());
        trace!(%entity, component = component.type_name(), enabled = component.is_enabled(), "attached");
        Ok(())
    }

    /// Enable or disable an attached component, registering or
    /// unregistering it accordingly. Setting the current state is a no-op.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotAttached`] if the component is not attached here.
    pub fn set_enabled(&self, component: &ComponentHandle, enabled: bool) -> Result<(), WorldError> {
        if !self.is_attached(component) {
            return Err(not_attached(component));
        }
        if component.is_enabled() == enabled {
            return Ok(());
        }

        component.set_enabled(enabled);
        if enabled {
            self.coordinator.register_component(component);
        } else {
            self.coordinator.unregister_component(component);
        }
        Ok(())
    }

    /// Detach a component from its owner. Returns `false` if it was not
    /// attached.
    pub fn detach(&self, component: &ComponentHandle) -> bool {
        let removed = {
            let mut entities = self.entities.borrow_mut();
            entities
                .get_mut(&component.owner().id())
                .and_then(|slot| {
                    let pos = slot.components.iter().position(|c| Rc::ptr_eq(c, component))?;
                    Some(slot.components.remove(pos))
                })
                .is_some()
        };
        if removed {
            self.coordinator.unregister_component(component);
            trace!(entity = %component.owner(), component = component.type_name(), "detached");
        }
        removed
    }

    /// Unregister every component of `entity` and drop its owner, making
    /// every handle to it stale. Returns `false` if it was already gone.
    pub fn destroy(&self, entity: &Entity) -> bool {
        let Some(slot) = self.entities.borrow_mut().remove(&entity.id()) else {
            return false;
        };
        for component in &slot.components {
            self.coordinator.unregister_component(component);
        }
        debug!(%entity, components = slot.components.len(), "destroyed");
        drop(slot);
        true
    }

    /// Destroy `entity` once the running phase has finished.
    pub fn destroy_at_end_of_phase(&self, entity: &Entity) {
        let world = self.this.clone();
        let entity = entity.clone();
        self.coordinator.run_at_end_of_current_phase(move || {
            let world = world.upgrade().ok_or(WorldError::Dropped)?;
            world.destroy(&entity);
            Ok(())
        });
    }

    /// Detach `component` once the running phase has finished.
    pub fn detach_at_end_of_phase(&self, component: &ComponentHandle) {
        let world = self.this.clone();
        let component = component.clone();
        self.coordinator.run_at_end_of_current_phase(move || {
            let world = world.upgrade().ok_or(WorldError::Dropped)?;
            world.detach(&component);
            Ok(())
        });
    }

    /// Spawn an entity at the next frame boundary and hand it to `setup`.
    pub fn spawn_at_end_of_frame<F>(&self, setup: F)
    where
        F: FnOnce(&World, &Entity) -> anyhow::Result<()> + 'static,
    {
        let world = self.this.clone();
        self.coordinator.run_at_end_of_frame(move || {
            let world = world.upgrade().ok_or(WorldError::Dropped)?;
            let entity = world.spawn();
            setup(&world, &entity)
        });
    }

    /// Every component of type `T` attached to `entity`, enabled or not.
    #[must_use]
    pub fn components_of<T: Component>(&self, entity: &Entity) -> Vec<ComponentHandle> {
        self.entities
            .borrow()
            .get(&entity.id())
            .map(|slot| slot.components.iter().filter(|c| c.is::<T>()).cloned().collect())
            .unwrap_or_default()
    }

    /// The first component of type `T` attached to `entity`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: &Entity) -> Option<ComponentHandle> {
        self.entities
            .borrow()
            .get(&entity.id())
            .and_then(|slot| slot.components.iter().find(|c| c.is::<T>()).cloned())
    }

    fn is_attached(&self, component: &ComponentHandle) -> bool {
        self.entities
            .borrow()
            .get(&component.owner().id())
            .is_some_and(|slot| slot.components.iter().any(|c| Rc::ptr_eq(c, component)))
    }
}

fn not_attached(component: &ComponentHandle) -> WorldError {
    WorldError::NotAttached {
        component: component.type_name(),
        entity: component.owner().id(),
    }
}

#[cfg(test)]
mod tests {
    use arms_component::CapabilityRegistry;
    use arms_coordinator::{CoordinatorConfig, Phase, PhaseContext, Processor, ProcessorDescriptor, ProcessorRegistration, Resolved};

    use super::*;
    use crate::components::{ContinuousMovement, Transform};

    struct Counter {
        calls: Rc<RefCell<Vec<u64>>>,
    }

    impl Processor for Counter {
        fn process(&mut self, _: &PhaseContext<'_>, entity: &Entity, _: &Resolved) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(entity.id());
            Ok(())
        }
    }

    fn make_world(calls: &Rc<RefCell<Vec<u64>>>) -> Rc<World> {
        let mut caps = CapabilityRegistry::new();
        caps.register::<Transform>().unwrap();
        caps.register::<ContinuousMovement>().unwrap();
        let c = calls.clone();
        let coordinator = Coordinator::new(
            CoordinatorConfig::default(),
            &caps,
            vec![ProcessorRegistration::new(
                ProcessorDescriptor::new("counter").requires::<Transform>(),
                move || Counter { calls: c },
            )],
        )
        .unwrap();
        World::install(Rc::new(coordinator))
    }

    #[test]
    fn test_install_sets_blackboard() {
        let world = make_world(&Rc::default());
        let fetched = world.coordinator().blackboard::<World>().unwrap();
        assert!(Rc::ptr_eq(&fetched, &world));
    }

    #[test]
    fn test_attach_registers_and_matches() {
        let world = make_world(&Rc::default());
        let e = world.spawn();
        world.attach(&e, Transform::default()).unwrap();
        assert_eq!(world.coordinator().matched_entities("counter").unwrap(), vec![e]);
    }

    #[test]
    fn test_attach_to_unknown_entity_fails() {
        let world = make_world(&Rc::default());
        let e = world.spawn();
        assert!(world.destroy(&e));
        let err = world.attach(&e, Transform::default()).unwrap_err();
        assert!(matches!(err, WorldError::UnknownEntity(id) if id == e.id()));
    }

    #[test]
    fn test_pooled_component_toggles() {
        let calls = Rc::default();
        let world = make_world(&calls);
        let e = world.spawn();
        let t = world.attach_disabled(&e, Transform::default()).unwrap();
        assert!(world.coordinator().matched_entities("counter").unwrap().is_empty());
        assert_eq!(world.coordinator().live_component_count(), 0);

        world.set_enabled(&t, true).unwrap();
        world.coordinator().tick(Phase::PreTick).unwrap();
        assert_eq!(*calls.borrow(), vec![e.id()]);

        world.set_enabled(&t, false).unwrap();
        world.coordinator().tick(Phase::PreTick).unwrap();
        assert_eq!(*calls.borrow(), vec![e.id()]);
        assert!(world.coordinator().matched_entities("counter").unwrap().is_empty());
    }

    #[test]
    fn test_set_enabled_on_detached_component_fails() {
        let world = make_world(&Rc::default());
        let e = world.spawn();
        let t = world.attach(&e, Transform::default()).unwrap();
        assert!(world.detach(&t));
        assert!(!world.detach(&t));
        assert!(matches!(world.set_enabled(&t, false), Err(WorldError::NotAttached { .. })));
    }

    #[test]
    fn test_destroy_makes_handles_stale() {
        let world = make_world(&Rc::default());
        let e = world.spawn();
        world.attach(&e, Transform::default()).unwrap();
        world.attach(&e, ContinuousMovement::default()).unwrap();

        assert!(world.destroy(&e));
        assert!(!e.is_alive());
        assert!(!world.contains(&e));
        assert_eq!(world.coordinator().live_component_count(), 0);
        assert!(!world.destroy(&e));

        world.coordinator().tick(Phase::PreTick).unwrap();
        assert!(world.coordinator().matched_entities("counter").unwrap().is_empty());
    }

    #[test]
    fn test_components_of_and_get() {
        let world = make_world(&Rc::default());
        let e = world.spawn();
        let first = world.attach(&e, Transform::default()).unwrap();
        world.attach_disabled(&e, Transform::default()).unwrap();
        world.attach(&e, ContinuousMovement::default()).unwrap();

        assert_eq!(world.components_of::<Transform>(&e).len(), 2);
        assert!(Rc::ptr_eq(&world.get::<Transform>(&e).unwrap(), &first));
        assert!(world.get::<Transform>(&Entity::null()).is_none());
    }

    #[test]
    fn test_spawn_at_end_of_frame() {
        let world = make_world(&Rc::default());
        world.spawn_at_end_of_frame(|world, entity| {
            world.attach(entity, Transform::default())?;
            Ok(())
        });
        assert_eq!(world.entity_count(), 0);

        let report = world.coordinator().on_frame_boundary().unwrap();
        assert!(report.is_clean());
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.coordinator().matched_entities("counter").unwrap().len(), 1);
    }

    #[test]
    fn test_deferred_action_after_world_dropped_fails() {
        let world = make_world(&Rc::default());
        let coordinator = world.coordinator().clone();
        let e = world.spawn();
        world.destroy_at_end_of_phase(&e);
        drop(world);

        let report = coordinator.tick(Phase::PreTick).unwrap();
        assert_eq!(report.deferred.failures.len(), 1);
        assert!(report.deferred.failures[0].message.contains("dropped"));
    }
}
