//! Domain models for the story board.
//!
//! A [`Story`] is created by the remote service and never edited locally;
//! everything the UI shows about it is either stored or derived here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{AppError, Result};

/// Server-assigned story identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One submitted link, as reported by the story service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    story_id: StoryId,
    title: String,
    author: String,
    url: String,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl Story {
    pub fn new(
        story_id: impl Into<StoryId>,
        title: impl Into<String>,
        author: impl Into<String>,
        url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            title: title.into(),
            author: author.into(),
            url: url.into(),
            username: username.into(),
            created_at: None,
        }
    }

    #[must_use]
    pub const fn story_id(&self) -> &StoryId {
        &self.story_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Username of the submitter.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Host portion of the story URL for display.
    ///
    /// Returns an empty string when the URL is not absolute or has no host,
    /// so one bad record never breaks rendering of a list.
    #[must_use]
    pub fn host_name(&self) -> String {
        let Ok(parsed) = Url::parse(self.url.trim()) else {
            return String::new();
        };

        match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        }
    }
}

impl From<String> for StoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Fields collected from the submit form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub author: String,
    pub url: String,
}

impl NewStory {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            url: url.into(),
        }
    }

    /// Check that every required field is present.
    ///
    /// # Errors
    /// Returns `AppError::Validation` naming the empty fields.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("title", &self.title),
            ("url", &self.url),
            ("author", &self.author),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }

    /// Copy with surrounding whitespace removed from every field.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            url: self.url.trim().to_string(),
        }
    }
}
