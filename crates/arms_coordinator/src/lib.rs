//! # arms_coordinator
//!
//! A single-threaded scheduler that matches entities to processors by the
//! component types they hold and runs those processors in three ordered
//! phases per frame.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use arms_component::{CapabilityRegistry, Component, Entity};
//! use arms_coordinator::{
//!     Coordinator, CoordinatorConfig, FrameConfig, FrameLoop, PhaseContext, Processor,
//!     ProcessorDescriptor, ProcessorRegistration, Resolved,
//! };
//!
//! struct Health(f32);
//!
//! impl Component for Health {
//!     fn type_name() -> &'static str {
//!         "Health"
//!     }
//! }
//!
//! struct Regenerate;
//!
//! impl Processor for Regenerate {
//!     fn process(&mut self, ctx: &PhaseContext<'_>, _: &Entity, c: &Resolved) -> anyhow::Result<()> {
//!         c.get_mut::<Health>(0)?.0 += ctx.delta_seconds();
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut capabilities = CapabilityRegistry::new();
//!     capabilities.register::<Health>()?;
//!
//!     let coordinator = Coordinator::new(
//!         CoordinatorConfig::from_env(),
//!         &capabilities,
//!         vec![ProcessorRegistration::new(
//!             ProcessorDescriptor::new("regenerate").requires::<Health>(),
//!             || Regenerate,
//!         )],
//!     )?;
//!
//!     FrameLoop::new(Rc::new(coordinator), FrameConfig::default()).run()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod deferred;
pub mod descriptor;
pub mod error;
pub mod match_index;
pub mod processor;
pub mod registry;
pub mod scheduler;
pub mod tick;

pub use config::{CoordinatorConfig, DEFAULT_TAG, ENABLED_TAGS_ENV};
pub use context::PhaseContext;
pub use coordinator::{Checkpoint, Coordinator, TickReport};
pub use deferred::{DeferredAction, DeferredFailure, DeferredQueue, DrainReport};
pub use descriptor::{MAX_REQUIRED_TYPES, Phase, ProcessorDescriptor};
pub use error::{ConfigError, CoordinatorError};
pub use match_index::{MatchIndex, MatchRecord, Resolved};
pub use processor::{ActivityPredicate, Processor, ProcessorFactory, ProcessorRegistration};
pub use registry::ComponentRegistry;
pub use tick::{FrameConfig, FrameLoop, FrameReport};
