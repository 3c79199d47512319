//! The [`Component`] trait and the records the coordinator tracks.
//!
//! A [`ComponentRecord`] pairs an opaque payload with the three things the
//! coordinator reads: its capability type, its owning [`Entity`], and its
//! enabled flag. Records are shared as [`ComponentHandle`]s so a processor
//! and the registry can refer to the same record.
//!
//! ## Capability Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! FNV-1a 64-bit, so the id of a capability does not depend on compiler
//! internals such as `std::any::TypeId`.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entity::Entity;
use crate::error::ComponentError;

/// Identifies a capability type. Derived from the type name with FNV-1a.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Hash a component name into its [`ComponentTypeId`].
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = (hash XOR byte) * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The id of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Data that can be attached to an entity.
///
/// # Examples
///
/// ```rust
/// use arms_component::Component;
///
/// #[derive(Debug, Default)]
/// struct Health {
///     current: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Any {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// Process-unique identity of a single component record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

impl ComponentId {
    fn next() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A shared reference to a [`ComponentRecord`].
pub type ComponentHandle = Rc<ComponentRecord>;

/// A typed, mutable data record owned by exactly one entity.
pub struct ComponentRecord {
    id: ComponentId,
    type_id: ComponentTypeId,
    type_name: &'static str,
    owner: Entity,
    enabled: Cell<bool>,
    payload: RefCell<Box<dyn Any>>,
}

impl ComponentRecord {
    /// Wrap `value` in a new enabled record owned by `owner`.
    #[must_use]
    pub fn new<T: Component>(owner: Entity, value: T) -> ComponentHandle {
        Rc::new(Self {
            id: ComponentId::next(),
            type_id: T::component_type_id(),
            type_name: T::type_name(),
            owner,
            enabled: Cell::new(true),
            payload: RefCell::new(Box::new(value)),
        })
    }

    /// Like [`ComponentRecord::new`] but starts disabled.
    #[must_use]
    pub fn new_disabled<T: Component>(owner: Entity, value: T) -> ComponentHandle {
        let record = Self::new(owner, value);
        record.set_enabled(false);
        record
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The entity that owns this record.
    #[must_use]
    pub fn owner(&self) -> &Entity {
        &self.owner
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Flip the enabled flag.
    ///
    /// This does not notify anyone. Hosts pair it with register/unregister
    /// calls on the coordinator.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Returns `true` if the payload is a `T`.
    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        self.type_id == T::component_type_id()
    }

    /// Borrow the payload as a `T`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::WrongType`] if the record holds another type,
    /// [`ComponentError::Borrowed`] if it is currently mutably borrowed.
    pub fn get<T: Component>(&self) -> Result<Ref<'_, T>, ComponentError> {
        let payload = self
            .payload
            .try_borrow()
            .map_err(|_| self.borrowed_error())?;
        Ref::filter_map(payload, |p| p.downcast_ref::<T>()).map_err(|_| self.wrong_type::<T>())
    }

    /// Mutably borrow the payload as a `T`.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentRecord::get`].
    pub fn get_mut<T: Component>(&self) -> Result<RefMut<'_, T>, ComponentError> {
        let payload = self
            .payload
            .try_borrow_mut()
            .map_err(|_| self.borrowed_error())?;
        RefMut::filter_map(payload, |p| p.downcast_mut::<T>()).map_err(|_| self.wrong_type::<T>())
    }

    fn borrowed_error(&self) -> ComponentError {
        ComponentError::Borrowed {
            component: self.type_name,
            entity: self.owner.id(),
        }
    }

    fn wrong_type<T: Component>(&self) -> ComponentError {
        ComponentError::WrongType {
            expected: T::type_name(),
            actual: self.type_name,
        }
    }
}

impl fmt::Debug for ComponentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRecord")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("owner", &self.owner)
            .field("enabled", &self.enabled.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityAllocator;

    #[derive(Debug, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug)]
    struct Velocity {
        x: f32,
    }

    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(Health::component_type_id(), ComponentTypeId::from_name("Health"));
        assert_eq!(ComponentTypeId::of::<Health>(), Health::component_type_id());
    }

    #[test]
    fn test_component_type_id_differs_between_types() {
        assert_ne!(Health::component_type_id(), Velocity::component_type_id());
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_record_ids_are_unique() {
        let mut alloc = EntityAllocator::new();
        let owner = alloc.allocate();
        let a = ComponentRecord::new(owner.handle(), Velocity { x: 0.0 });
        let b = ComponentRecord::new(owner.handle(), Velocity { x: 0.0 });
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_get_and_get_mut() {
        let mut alloc = EntityAllocator::new();
        let owner = alloc.allocate();
        let record = ComponentRecord::new(
            owner.handle(),
            Health {
                current: 50.0,
                max: 100.0,
            },
        );

        record.get_mut::<Health>().unwrap().current = 75.0;
        assert_eq!(record.get::<Health>().unwrap().current, 75.0);
        assert_eq!(record.get::<Health>().unwrap().max, 100.0);
        assert!(record.is::<Health>());
        assert_eq!(record.owner(), owner.entity());
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let mut alloc = EntityAllocator::new();
        let owner = alloc.allocate();
        let record = ComponentRecord::new(owner.handle(), Velocity { x: 1.0 });

        let err = record.get::<Health>().unwrap_err();
        assert!(matches!(
            err,
            ComponentError::WrongType {
                expected: "Health",
                actual: "Velocity"
            }
        ));
        assert_eq!(record.get::<Velocity>().unwrap().x, 1.0);
    }

    #[test]
    fn test_double_mutable_borrow_is_an_error() {
        let mut alloc = EntityAllocator::new();
        let owner = alloc.allocate();
        let record = ComponentRecord::new(owner.handle(), Velocity { x: 1.0 });

        let _held = record.get_mut::<Velocity>().unwrap();
        assert!(matches!(
            record.get_mut::<Velocity>(),
            Err(ComponentError::Borrowed { .. })
        ));
    }

    #[test]
    fn test_disabled_constructor() {
        let mut alloc = EntityAllocator::new();
        let owner = alloc.allocate();
        let record = ComponentRecord::new_disabled(owner.handle(), Velocity { x: 1.0 });
        assert!(!record.is_enabled());
        record.set_enabled(true);
        assert!(record.is_enabled());
    }
}
