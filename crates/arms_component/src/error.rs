//! Component-level error types.

use crate::component::ComponentTypeId;

/// Errors raised when accessing a component payload.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The record holds a different component type.
    #[error("expected component `{expected}`, found `{actual}`")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The payload is already borrowed in a conflicting way.
    #[error("component `{component}` on entity {entity} is already borrowed")]
    Borrowed {
        component: &'static str,
        entity: u64,
    },

    /// A resolved component index was out of range.
    #[error("component index {index} out of range for {len} resolved components")]
    OutOfRange { index: usize, len: usize },

    /// No resolved component has the requested type.
    #[error("no resolved component of type `{0}`")]
    Missing(&'static str),
}

/// Errors raised while building a [`CapabilityRegistry`](crate::CapabilityRegistry).
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Two different names hash to the same id.
    #[error("capability `{name}` collides with `{existing}` (id {type_id})")]
    Collision {
        name: String,
        existing: String,
        type_id: ComponentTypeId,
    },
}
