//! Processor descriptors.
//!
//! A [`ProcessorDescriptor`] is the static metadata attached to a processor:
//! the ordered capability types it requires, the [`Phase`] it runs in, its
//! priority within that phase, and the cohort tag used to switch whole groups
//! of processors on or off at startup.

use std::collections::HashSet;
use std::fmt;

use arms_component::{CapabilityRegistry, Component, ComponentTypeId};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TAG;
use crate::error::ConfigError;

/// The most component types a single processor may require.
pub const MAX_REQUIRED_TYPES: usize = 5;

/// Per-frame execution stage. Frames run the phases in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Before the physics step.
    PreTick,
    /// The physics step.
    Tick,
    /// After physics, before presentation.
    PostTick,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::PreTick, Phase::Tick, Phase::PostTick];

    /// Position of this phase within a frame.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Phase::PreTick => 0,
            Phase::Tick => 1,
            Phase::PostTick => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::PreTick => "pre_tick",
            Phase::Tick => "tick",
            Phase::PostTick => "post_tick",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one processor.
///
/// The required type list is fixed once the processor is registered.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    name: String,
    required: Vec<ComponentTypeId>,
    phase: Phase,
    priority: i32,
    tag: String,
}

impl ProcessorDescriptor {
    /// Start a descriptor with defaults: no requirements, [`Phase::PreTick`],
    /// priority 0, tag [`DEFAULT_TAG`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            phase: Phase::PreTick,
            priority: 0,
            tag: DEFAULT_TAG.to_string(),
        }
    }

    /// Append component type `T` to the required list.
    #[must_use]
    pub fn requires<T: Component>(self) -> Self {
        self.requires_type(T::component_type_id())
    }

    /// Append a capability by id.
    #[must_use]
    pub fn requires_type(mut self, type_id: ComponentTypeId) -> Self {
        self.required.push(type_id);
        self
    }

    #[must_use]
    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Lower priorities run first.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required capability types, in the order resolved components are
    /// handed to the processor.
    #[must_use]
    pub fn required(&self) -> &[ComponentTypeId] {
        &self.required
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Check the descriptor against the known capabilities.
    ///
    /// `position` is the descriptor's index in the startup list and is only
    /// used to identify nameless descriptors.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(
        &self,
        position: usize,
        capabilities: &CapabilityRegistry,
    ) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName { position });
        }

        if self.required.len() > MAX_REQUIRED_TYPES {
            return Err(ConfigError::TooManyRequiredTypes {
                processor: self.name.clone(),
                count: self.required.len(),
                max: MAX_REQUIRED_TYPES,
            });
        }

        let mut seen = HashSet::with_capacity(self.required.len());
        for &type_id in &self.required {
            if !capabilities.contains(type_id) {
                return Err(ConfigError::UnknownCapability {
                    processor: self.name.clone(),
                    type_id,
                });
            }
            if !seen.insert(type_id) {
                return Err(ConfigError::DuplicateRequiredType {
                    processor: self.name.clone(),
                    component: capabilities.label(type_id),
                });
            }
        }

        Ok(())
    }
}
