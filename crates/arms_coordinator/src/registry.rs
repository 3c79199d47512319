//! Live component registry.
//!
//! The coordinator keeps every registered [`ComponentRecord`] here. It is the
//! source of truth for "does this entity currently hold an enabled component
//! of type T", which drives matching, and it answers type queries for
//! processors.
//!
//! [`ComponentRecord`]: arms_component::ComponentRecord

use std::collections::{BTreeMap, HashMap};

use arms_component::{ComponentHandle, ComponentId, ComponentTypeId, Entity};

/// All registered component records, indexed by id and by owner.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Records keyed by id. Ids increase monotonically, so iteration follows
    /// creation order.
    components: BTreeMap<ComponentId, ComponentHandle>,
    /// Records grouped by owning entity id.
    by_entity: HashMap<u64, Vec<ComponentHandle>>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            by_entity: HashMap::new(),
        }
    }

    /// Add a record. Returns `false` if it was already registered.
    pub fn register(&mut self, component: ComponentHandle) -> bool {
        if self.components.contains_key(&component.id()) {
            return false;
        }
        self.by_entity
            .entry(component.owner().id())
            .or_default()
            .push(component.clone());
        self.components.insert(component.id(), component);
        true
    }

    /// Remove a record. Returns `true` if it was registered.
    pub fn unregister(&mut self, component: &ComponentHandle) -> bool {
        if self.components.remove(&component.id()).is_none() {
            return false;
        }
        let owner = component.owner().id();
        if let Some(owned) = self.by_entity.get_mut(&owner) {
            owned.retain(|c| c.id() != component.id());
            if owned.is_empty() {
                self.by_entity.remove(&owner);
            }
        }
        true
    }

    /// Returns `true` if the record is registered.
    #[must_use]
    pub fn contains(&self, component: &ComponentHandle) -> bool {
        self.components.contains_key(&component.id())
    }

    /// Returns `true` if the record is registered and enabled.
    #[must_use]
    pub fn is_current(&self, component: &ComponentHandle) -> bool {
        component.is_enabled() && self.contains(component)
    }

    /// The first registered, enabled record of `type_id` owned by `entity`.
    #[must_use]
    pub fn find_enabled(&self, entity: &Entity, type_id: ComponentTypeId) -> Option<ComponentHandle> {
        self.by_entity
            .get(&entity.id())?
            .iter()
            .find(|c| c.type_id() == type_id && c.is_enabled())
            .cloned()
    }

    /// Returns `true` if `entity` holds an enabled record of `type_id`.
    #[must_use]
    pub fn has_enabled(&self, entity: &Entity, type_id: ComponentTypeId) -> bool {
        self.by_entity
            .get(&entity.id())
            .is_some_and(|owned| owned.iter().any(|c| c.type_id() == type_id && c.is_enabled()))
    }

    /// Snapshot of every record of `type_id` whose owner is still alive.
    #[must_use]
    pub fn of_type(&self, type_id: ComponentTypeId) -> Vec<ComponentHandle> {
        self.components
            .values()
            .filter(|c| c.type_id() == type_id && c.owner().is_alive())
            .cloned()
            .collect()
    }

    /// Drop every record whose owner has been destroyed. Returns how many
    /// were removed.
    pub fn purge_stale_owners(&mut self) -> usize {
        let before = self.components.len();
        self.components.retain(|_, c| c.owner().is_alive());
        self.by_entity
            .retain(|_, owned| owned.first().is_some_and(|c| c.owner().is_alive()));
        before - self.components.len()
    }

    /// Total number of registered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of distinct entities that own at least one record.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }
}
