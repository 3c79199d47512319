//! Per-processor match sets.
//!
//! A [`MatchIndex`] holds one [`MatchRecord`] for every entity known to
//! satisfy a processor's requirements, together with the components resolved
//! for it. Records are inserted synchronously when a component registers and
//! removed only by reconciliation, so a tick can iterate a snapshot without
//! the set changing underneath it.

use std::cell::{Ref, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use arms_component::{Component, ComponentError, ComponentHandle, ComponentTypeId, Entity};

use crate::registry::ComponentRegistry;

/// The components resolved for one match, in the processor's required order.
#[derive(Debug, Clone)]
pub struct Resolved {
    components: Vec<ComponentHandle>,
}

impl Resolved {
    /// Look up one enabled component per required type. Returns `None` if
    /// any type is missing, so a `Resolved` always has exactly
    /// `required.len()` entries.
    pub(crate) fn resolve(
        entity: &Entity,
        required: &[ComponentTypeId],
        registry: &ComponentRegistry,
    ) -> Option<Self> {
        let components = required
            .iter()
            .map(|&type_id| registry.find_enabled(entity, type_id))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { components })
    }

    /// Returns `true` while every resolved record is registered and enabled.
    pub(crate) fn is_current(&self, registry: &ComponentRegistry) -> bool {
        self.components.iter().all(|c| registry.is_current(c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The handle at `index`.
    #[must_use]
    pub fn handle(&self, index: usize) -> Option<&ComponentHandle> {
        self.components.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentHandle> {
        self.components.iter()
    }

    /// Borrow the component at `index` as a `T`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::OutOfRange`] for a bad index, otherwise the errors
    /// of [`ComponentRecord::get`](arms_component::ComponentRecord::get).
    pub fn get<T: Component>(&self, index: usize) -> Result<Ref<'_, T>, ComponentError> {
        self.at(index)?.get::<T>()
    }

    /// Mutably borrow the component at `index` as a `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Resolved::get`].
    pub fn get_mut<T: Component>(&self, index: usize) -> Result<RefMut<'_, T>, ComponentError> {
        self.at(index)?.get_mut::<T>()
    }

    /// The first resolved handle holding a `T`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Missing`] if no resolved component is a `T`.
    pub fn find<T: Component>(&self) -> Result<&ComponentHandle, ComponentError> {
        self.components
            .iter()
            .find(|c| c.is::<T>())
            .ok_or(ComponentError::Missing(T::type_name()))
    }

    fn at(&self, index: usize) -> Result<&ComponentHandle, ComponentError> {
        self.components.get(index).ok_or(ComponentError::OutOfRange {
            index,
            len: self.components.len(),
        })
    }
}

/// One processor/entity association.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    entity: Entity,
    resolved: Resolved,
}

impl MatchRecord {
    pub(crate) fn new(entity: Entity, resolved: Resolved) -> Self {
        Self { entity, resolved }
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    #[must_use]
    pub fn resolved(&self) -> &Resolved {
        &self.resolved
    }
}

/// The match set and pending-initialization list of one processor.
#[derive(Debug, Default)]
pub struct MatchIndex {
    /// Records in insertion order.
    records: Vec<Rc<MatchRecord>>,
    /// Entity id to position in `records`.
    positions: HashMap<u64, usize>,
    /// Entity ids awaiting initialization, FIFO.
    pending: Vec<u64>,
    pending_set: HashSet<u64>,
}

impl MatchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, entity: &Entity) -> Option<&Rc<MatchRecord>> {
        self.positions.get(&entity.id()).map(|&i| &self.records[i])
    }

    /// Insert a record for a newly matching entity and queue it for
    /// initialization. Returns `false`, leaving the index untouched, if the
    /// entity already has a record.
    pub fn insert(&mut self, record: MatchRecord) -> bool {
        let id = record.entity().id();
        if self.positions.contains_key(&id) {
            return false;
        }
        self.positions.insert(id, self.records.len());
        self.records.push(Rc::new(record));
        if self.pending_set.insert(id) {
            self.pending.push(id);
        }
        true
    }

    /// Replace the resolved components of an existing record in place.
    /// Initialization state is unchanged. Returns `false` if the entity has
    /// no record.
    pub fn refresh(&mut self, record: MatchRecord) -> bool {
        match self.positions.get(&record.entity().id()) {
            Some(&i) => {
                self.records[i] = Rc::new(record);
                true
            }
            None => false,
        }
    }

    /// Remove the record for `entity` and any pending initialization.
    pub fn remove(&mut self, entity: &Entity) -> bool {
        let id = entity.id();
        if !self.positions.contains_key(&id) {
            return false;
        }
        self.records.retain(|r| r.entity().id() != id);
        self.forget_pending(id);
        self.reindex();
        true
    }

    /// Remove every record whose entity is stale. Returns how many were
    /// removed.
    pub fn purge_stale(&mut self) -> usize {
        let before = self.records.len();
        let mut stale = Vec::new();
        self.records.retain(|r| {
            let alive = r.entity().is_alive();
            if !alive {
                stale.push(r.entity().id());
            }
            alive
        });
        if stale.is_empty() {
            return 0;
        }
        for id in stale {
            self.forget_pending(id);
        }
        self.reindex();
        before - self.records.len()
    }

    /// Take every record awaiting initialization, in the order they were
    /// matched, and clear the pending list.
    pub fn take_pending(&mut self) -> Vec<Rc<MatchRecord>> {
        self.pending_set.clear();
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|id| self.positions.get(&id).map(|&i| self.records[i].clone()))
            .collect()
    }

    /// Snapshot of the records that have been initialized.
    #[must_use]
    pub fn initialized(&self) -> Vec<Rc<MatchRecord>> {
        self.records
            .iter()
            .filter(|r| !self.pending_set.contains(&r.entity().id()))
            .cloned()
            .collect()
    }

    /// Snapshot of every matched entity, in insertion order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.records.iter().map(|r| r.entity().clone()).collect()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn forget_pending(&mut self, id: u64) {
        if self.pending_set.remove(&id) {
            self.pending.retain(|&p| p != id);
        }
    }

    fn reindex(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.entity().id(), i))
            .collect();
    }
}
