//! tasklink core library: identifiers, canonical vocabulary, configuration.
//!
//! - [`types`]: native ids, systems, entity kinds, canonical task states
//! - [`vocabulary`]: status definitions and priority scales
//! - [`checkpoint`]: second-resolution sync checkpoints
//! - [`config`]: `~/.tasklink/config.yaml` load / save
//! - [`error`]: [`ConfigError`]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod types;
pub mod vocabulary;

pub use checkpoint::Checkpoint;
pub use config::{CreationSelector, GeminiOptions, Options, ProjectCreation, PureCmOptions};
pub use error::ConfigError;
pub use types::{EntityKind, NativeId, System, TaskState};
pub use vocabulary::{PriorityScale, ScaleDirection, StatusDefinition, DEFAULT_PRIORITY};
