//! The ordered collection of stories known to the client.

use std::collections::HashSet;

use serde::Serialize;

use super::models::{Story, StoryId};

/// Stories in server order (newest first), unique by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StoryList {
    stories: Vec<Story>,
}

impl StoryList {
    /// Build a list from records in server order.
    ///
    /// Later records repeating an id already seen are dropped.
    pub fn from_records(records: impl IntoIterator<Item = Story>) -> Self {
        let mut seen = HashSet::new();
        let mut stories = Vec::new();

        for story in records {
            if seen.insert(story.story_id().clone()) {
                stories.push(story);
            } else {
                tracing::warn!(story_id = %story.story_id(), "Dropping duplicate story record");
            }
        }

        Self { stories }
    }

    #[must_use]
    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn iter(&self) -> impl Iterator<Item = &Story> {
        self.stories.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| s.story_id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &StoryId) -> bool {
        self.get(id).is_some()
    }

    /// Insert a story at the head. An existing record with the same id is
    /// replaced so ids stay unique.
    pub fn prepend(&mut self, story: Story) {
        self.stories.retain(|s| s.story_id() != story.story_id());
        self.stories.insert(0, story);
    }

    /// Append a story at the tail unless its id is already present.
    pub fn push(&mut self, story: Story) {
        if !self.contains(story.story_id()) {
            self.stories.push(story);
        }
    }

    /// Remove a story by id, returning it if it was present.
    pub fn remove(&mut self, id: &StoryId) -> Option<Story> {
        let index = self.stories.iter().position(|s| s.story_id() == id)?;
        Some(self.stories.remove(index))
    }
}

impl<'a> IntoIterator for &'a StoryList {
    type Item = &'a Story;
    type IntoIter = std::slice::Iter<'a, Story>;

    fn into_iter(self) -> Self::IntoIter {
        self.stories.iter()
    }
}
