//! Domain-level error types for storyboard.
//!
//! All errors are typed with `thiserror`. The four synchronization kinds
//! (validation, auth, not-found, transport) are what the story and favorite
//! operations report; the rest belong to configuration and local I/O.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed submission fields, caught before any network call
    /// or rejected by the service as a bad request.
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Expired or invalid credential, or not permitted (e.g. not the owner).
    #[error("Not authorized: {message}")]
    Auth { message: String },

    /// The referenced story no longer exists.
    #[error("Story not found: {story_id}")]
    NotFound { story_id: String },

    /// Network or service unavailable.
    #[error("Service unavailable: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a not-found error for a story id.
    pub fn not_found(story_id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            story_id: story_id.to_string(),
        }
    }

    /// Create a transport error from an underlying client error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Short machine-friendly label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Auth { .. } => "auth",
            Self::NotFound { .. } => "not_found",
            Self::Transport { .. } => "transport",
            Self::JsonParse { .. } => "json",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
