//! Infrastructure layer - external adapters (story service, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod api;
pub mod config;
#[cfg(test)]
pub mod memory_api;

pub use api::{Credentials, HttpStoryApi, StoryApi};
pub use config::{ensure_config_exists, load_config, save_config};
