//! Configuration for the Horizon LOD pipeline.
//!
//! Settings persist to disk as RON, can be overridden from the command
//! line via clap, and support hot-reload detection. Unknown and missing
//! fields are tolerated so old files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, GenerationConfig, MeshConfig, WorldConfig};
pub use error::ConfigError;
