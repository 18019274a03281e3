//! Domain layer - core models and error types.
//!
//! This layer holds the story board's data model and its invariants
//! without any I/O (network, filesystem, terminal).

pub mod error;
pub mod models;
pub mod settings;
pub mod story_list;
pub mod user;

pub use error::{AppError, Result};
pub use models::{NewStory, Story, StoryId};
pub use settings::{ApiConfig, AppConfig};
pub use story_list::StoryList;
pub use user::{AuthToken, User};
