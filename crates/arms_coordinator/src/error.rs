//! Coordinator error types.

use std::path::PathBuf;

use arms_component::ComponentTypeId;

use crate::coordinator::Checkpoint;

/// Startup configuration errors. Any of these aborts coordinator
/// construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A descriptor carries no usable metadata.
    #[error("processor descriptor #{position} has no name")]
    MissingName { position: usize },

    /// A descriptor requires more component types than supported.
    #[error("processor `{processor}` requires {count} component types, at most {max} are supported")]
    TooManyRequiredTypes {
        processor: String,
        count: usize,
        max: usize,
    },

    /// A descriptor lists the same component type twice.
    #[error("processor `{processor}` requires `{component}` more than once")]
    DuplicateRequiredType {
        processor: String,
        component: String,
    },

    /// A descriptor requires a type that is not a known capability.
    #[error("processor `{processor}` requires unknown component type {type_id}")]
    UnknownCapability {
        processor: String,
        type_id: ComponentTypeId,
    },

    /// Two descriptors share a name.
    #[error("processor `{processor}` is registered more than once")]
    DuplicateProcessor { processor: String },

    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while the coordinator is running.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// `tick` or `on_frame_boundary` was called while another checkpoint
    /// was still running.
    #[error("`{call}` called while the {running} is still running")]
    Reentrant {
        call: &'static str,
        running: Checkpoint,
    },

    /// The frame loop was configured with a tick rate it cannot pace.
    #[error("tick rate {0} must be a finite number of frames per second greater than zero")]
    InvalidTickRate(f64),

    /// No blackboard of the requested type is attached.
    #[error("no blackboard of type `{0}` is attached")]
    MissingBlackboard(&'static str),
}
