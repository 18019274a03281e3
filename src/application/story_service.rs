//! Remote-backed story and favorite operations.
//!
//! Each call returns only once the service has confirmed (or refused) the
//! change; nothing here touches the in-memory model. Applying a confirmed
//! result is the controller's job.

use std::sync::Arc;

use crate::domain::{AppError, AuthToken, NewStory, Result, Story, StoryId, StoryList, User};
use crate::infrastructure::{Credentials, StoryApi};

pub struct StoryService {
    api: Arc<dyn StoryApi>,
}

impl StoryService {
    #[must_use]
    pub fn new(api: Arc<dyn StoryApi>) -> Self {
        Self { api }
    }

    /// Fetch the full story list, newest first.
    ///
    /// # Errors
    /// Returns `Transport` (or whatever the service reports) on failure; the
    /// caller keeps its previous list.
    pub async fn fetch_all(&self) -> Result<StoryList> {
        let records = self.api.fetch_stories().await?;
        let list = StoryList::from_records(records);
        tracing::info!(count = list.len(), "Fetched stories");
        Ok(list)
    }

    /// Submit a new story and return the service's canonical record.
    ///
    /// # Errors
    /// `Validation` for empty fields (no request is made), `Auth` for a bad
    /// token, `Transport` on network failure.
    pub async fn add_story(&self, creds: &Credentials, story: &NewStory) -> Result<Story> {
        story.validate()?;
        let created = self.api.create_story(creds, &story.trimmed()).await?;
        tracing::info!(story_id = %created.story_id(), "Story created");
        Ok(created)
    }

    /// Delete a story owned by `creds`.
    ///
    /// # Errors
    /// `NotFound`, `Auth` (not the owner) or `Transport`.
    pub async fn remove_story(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        self.api.delete_story(creds, id).await?;
        tracing::info!(story_id = %id, "Story deleted");
        Ok(())
    }

    /// Mark a story as a favorite.
    ///
    /// # Errors
    /// `Auth`, `NotFound` or `Transport`.
    pub async fn add_favorite(&self, creds: &Credentials, story: &Story) -> Result<()> {
        self.api.add_favorite(creds, story.story_id()).await?;
        tracing::info!(story_id = %story.story_id(), "Favorite added");
        Ok(())
    }

    /// Remove a story from favorites.
    ///
    /// # Errors
    /// `Auth`, `NotFound` or `Transport`.
    pub async fn remove_favorite(&self, creds: &Credentials, story: &Story) -> Result<()> {
        self.api.remove_favorite(creds, story.story_id()).await?;
        tracing::info!(story_id = %story.story_id(), "Favorite removed");
        Ok(())
    }

    /// Log in with a username and password.
    ///
    /// # Errors
    /// `Validation` for empty credentials, `Auth` when refused.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        require("username", username)?;
        require("password", password)?;

        let (record, token) = self.api.login(username.trim(), password).await?;
        Ok(record.into_user(token))
    }

    /// Create an account and log in as it.
    ///
    /// # Errors
    /// `Validation` for empty fields or a taken username.
    pub async fn signup(&self, username: &str, password: &str, name: &str) -> Result<User> {
        require("username", username)?;
        require("password", password)?;
        require("name", name)?;

        let (record, token) = self.api.signup(username.trim(), password, name.trim()).await?;
        Ok(record.into_user(token))
    }

    /// Rebuild a user from a previously issued token.
    ///
    /// # Errors
    /// `Auth` when the token is no longer valid.
    pub async fn resume(&self, username: &str, token: AuthToken) -> Result<User> {
        require("username", username)?;

        let creds = Credentials {
            username: username.trim().to_string(),
            token,
        };
        let record = self.api.fetch_user(&creds).await?;
        Ok(record.into_user(creds.token))
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(AppError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
