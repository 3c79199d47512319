//! # arms_component
//!
//! The entity and component primitives the coordinator matches against.
//!
//! This crate provides:
//!
//! - [`Entity`]: a comparable handle that goes stale when its owner drops.
//! - [`EntityOwner`] / [`EntityAllocator`]: the host side of entity lifetime.
//! - [`Component`] trait and [`ComponentTypeId`]: capability type identity.
//! - [`ComponentRecord`]: a typed, enable-able record owned by one entity.
//! - [`CapabilityRegistry`]: the set of component types processors may require.

pub mod capability;
pub mod component;
pub mod entity;
pub mod error;

pub use capability::CapabilityRegistry;
pub use component::{Component, ComponentHandle, ComponentId, ComponentRecord, ComponentTypeId};
pub use entity::{Entity, EntityAllocator, EntityOwner};
pub use error::{CapabilityError, ComponentError};
