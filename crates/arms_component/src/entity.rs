//! Entity handles and their owners.
//!
//! An [`Entity`] is an identity plus a weak liveness token. The host object
//! model holds the matching [`EntityOwner`]; once the owner is dropped every
//! clone of the handle reports itself stale through [`Entity::is_alive`]. The
//! coordinator never owns entity lifetime, it only observes it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker kept alive by an [`EntityOwner`].
#[derive(Debug)]
struct Alive;

/// A handle to an entity.
///
/// Handles compare, order and hash by id only, so a stale handle still
/// equals the live handle it was cloned from.
#[derive(Clone)]
pub struct Entity {
    id: u64,
    liveness: Weak<Alive>,
}

impl Entity {
    /// A handle that refers to nothing and is never alive.
    #[must_use]
    pub fn null() -> Self {
        Self {
            id: 0,
            liveness: Weak::new(),
        }
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` while the owning [`EntityOwner`] exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.id != 0 && self.liveness.strong_count() > 0
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.id)
    }
}

/// The strong side of an entity. Dropping it destroys the entity.
#[derive(Debug)]
pub struct EntityOwner {
    entity: Entity,
    _alive: Rc<Alive>,
}

impl EntityOwner {
    /// Returns a borrowed handle.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Returns a new handle to the owned entity.
    #[must_use]
    pub fn handle(&self) -> Entity {
        self.entity.clone()
    }
}

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates live entities.
///
/// IDs are unique across every allocator in the process and start at 1; 0
/// is reserved for [`Entity::null`].
#[derive(Debug)]
pub struct EntityAllocator {
    allocated: u64,
}

impl EntityAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self { allocated: 0 }
    }

    /// Allocates a fresh, live entity.
    pub fn allocate(&mut self) -> EntityOwner {
        let id = NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed);
        self.allocated += 1;
        let alive = Rc::new(Alive);
        EntityOwner {
            entity: Entity {
                id,
                liveness: Rc::downgrade(&alive),
            },
            _alive: alive,
        }
    }

    /// Returns the number of entities this allocator has handed out.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.allocated
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
