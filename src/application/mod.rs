//! Application layer - use cases and orchestration.
//!
//! This layer turns user intents into confirmed remote changes and keeps
//! the session model and the rendered lists in step with them.

pub mod controller;
pub mod formatter;
pub mod render;
pub mod session;
pub mod story_service;

pub use controller::{Intent, Notice, SyncController};
pub use formatter::{OutputFormat, TerminalRenderer};
pub use render::View;
