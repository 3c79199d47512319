//! The set of valid capability types.
//!
//! Processors declare required capabilities by [`ComponentTypeId`]. At
//! startup the coordinator rejects any processor whose requirements are not
//! in the [`CapabilityRegistry`], so a typo in a descriptor fails loudly
//! instead of producing a processor that can never match.

use std::collections::BTreeMap;

use crate::component::{Component, ComponentTypeId};
use crate::error::CapabilityError;

/// Known capability types keyed by id.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    names: BTreeMap<ComponentTypeId, String>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: BTreeMap::new(),
        }
    }

    /// Register component type `T`. Registering the same type twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Collision`] if another name already owns
    /// the same id.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, CapabilityError> {
        self.register_name(T::type_name())
    }

    /// Register a capability by name.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Collision`] if another name already owns
    /// the same id.
    pub fn register_name(&mut self, name: &str) -> Result<ComponentTypeId, CapabilityError> {
        let type_id = ComponentTypeId::from_name(name);
        match self.names.get(&type_id) {
            Some(existing) if existing != name => Err(CapabilityError::Collision {
                name: name.to_string(),
                existing: existing.clone(),
                type_id,
            }),
            Some(_) => Ok(type_id),
            None => {
                self.names.insert(type_id, name.to_string());
                Ok(type_id)
            }
        }
    }

    /// Returns `true` if `type_id` is a registered capability.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId) -> bool {
        self.names.contains_key(&type_id)
    }

    /// Returns the registered name for `type_id`.
    #[must_use]
    pub fn name_of(&self, type_id: ComponentTypeId) -> Option<&str> {
        self.names.get(&type_id).map(String::as_str)
    }

    /// Returns a display label: the name if known, otherwise the hex id.
    #[must_use]
    pub fn label(&self, type_id: ComponentTypeId) -> String {
        self.name_of(type_id)
            .map_or_else(|| type_id.to_string(), str::to_string)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Timer;

    impl Component for Timer {
        fn type_name() -> &'static str {
            "Timer"
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut caps = CapabilityRegistry::new();
        let id = caps.register::<Timer>().unwrap();
        assert!(caps.contains(id));
        assert_eq!(caps.name_of(id), Some("Timer"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_register_twice_is_idempotent() {
        let mut caps = CapabilityRegistry::new();
        caps.register::<Timer>().unwrap();
        caps.register_name("Timer").unwrap();
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_unknown_label_falls_back_to_hex() {
        let caps = CapabilityRegistry::new();
        let id = ComponentTypeId(0xff);
        assert!(!caps.contains(id));
        assert_eq!(caps.label(id), "0x00000000000000ff");
    }
}
