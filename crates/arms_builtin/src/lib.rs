//! # arms_builtin
//!
//! A reference host for `arms_coordinator`: the [`World`] object model that
//! owns entities and forwards lifecycle events, plus a handful of built-in
//! components and the processors that drive them.

pub mod components;
pub mod processors;
pub mod world;

pub use components::{CompleteCallback, ContinuousMovement, DelayedAction, Expirable, Transform, UpdateCallback};
pub use processors::{
    ContinuousMovementProcessor, DelayedActionProcessor, ExpirableProcessor, builtin_processors,
    register_builtin_capabilities,
};
pub use world::{World, WorldError};
