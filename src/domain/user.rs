//! The authenticated user and the two story subsets tied to them.
//!
//! `own_stories` and `favorites` are independent relations. Both mirror the
//! service: they are seeded from the login response and afterwards only
//! patched with mutations the service has confirmed.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::models::{Story, StoryId};
use super::story_list::StoryList;

/// Opaque bearer credential issued by the auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// A logged-in user.
#[derive(Debug, Clone)]
pub struct User {
    username: String,
    name: String,
    created_at: Option<DateTime<Utc>>,
    token: AuthToken,
    own_stories: StoryList,
    favorites: StoryList,
    favorite_ids: HashSet<StoryId>,
}

impl User {
    pub fn new(username: impl Into<String>, name: impl Into<String>, token: AuthToken) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            created_at: None,
            token,
            own_stories: StoryList::default(),
            favorites: StoryList::default(),
            favorite_ids: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Seed both subsets from the service's view of this user.
    #[must_use]
    pub fn with_stories(
        mut self,
        own_stories: impl IntoIterator<Item = Story>,
        favorites: impl IntoIterator<Item = Story>,
    ) -> Self {
        self.own_stories = StoryList::from_records(own_stories);
        self.favorites = StoryList::from_records(favorites);
        self.favorite_ids = self
            .favorites
            .iter()
            .map(|s| s.story_id().clone())
            .collect();
        self
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    #[must_use]
    pub const fn token(&self) -> &AuthToken {
        &self.token
    }

    #[must_use]
    pub const fn own_stories(&self) -> &StoryList {
        &self.own_stories
    }

    #[must_use]
    pub const fn favorites(&self) -> &StoryList {
        &self.favorites
    }

    #[must_use]
    pub fn is_favorite(&self, story: &Story) -> bool {
        self.is_favorite_id(story.story_id())
    }

    #[must_use]
    pub fn is_favorite_id(&self, id: &StoryId) -> bool {
        self.favorite_ids.contains(id)
    }

    #[must_use]
    pub fn is_own_story(&self, story: &Story) -> bool {
        self.own_stories.contains(story.story_id())
    }

    /// Record a confirmed favorite.
    pub fn record_favorite(&mut self, story: Story) {
        if self.favorite_ids.insert(story.story_id().clone()) {
            self.favorites.push(story);
        }
    }

    /// Record a confirmed unfavorite.
    pub fn record_unfavorite(&mut self, id: &StoryId) {
        if self.favorite_ids.remove(id) {
            self.favorites.remove(id);
        }
    }

    /// Record a story this user just created.
    pub fn record_own_story(&mut self, story: Story) {
        self.own_stories.prepend(story);
    }

    /// Drop every reference to a deleted story.
    pub fn forget_story(&mut self, id: &StoryId) {
        self.own_stories.remove(id);
        self.record_unfavorite(id);
    }
}
