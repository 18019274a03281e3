//! Session-scoped state: the shared story list, the current user, and which
//! lists are on screen.
//!
//! Every `apply_*` method takes the epoch the action started in. Changes to
//! the shared list always land (they describe the service). Additions to the
//! user's subsets are only made when the epoch still matches, so a completion
//! that outlives a logout never touches a torn-down user. Removals reach
//! whoever is logged in now: a deleted id has no place in any subset.

use std::collections::BTreeSet;

use crate::domain::{Story, StoryId, StoryList, User};

use super::render::{Star, StoryRow, View};

#[derive(Debug, Default)]
pub struct Session {
    stories: StoryList,
    user: Option<User>,
    epoch: u64,
    visible: BTreeSet<View>,
}

impl Session {
    #[must_use]
    pub const fn stories(&self) -> &StoryList {
        &self.stories
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Bumped on every login and logout.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn begin(&mut self, user: User) {
        self.epoch += 1;
        self.user = Some(user);
    }

    /// Tear down the current user. Lists that need a user are hidden.
    pub fn end(&mut self) -> Option<User> {
        self.epoch += 1;
        self.visible.retain(|v| !v.requires_user());
        self.user.take()
    }

    pub fn replace_stories(&mut self, stories: StoryList) {
        self.stories = stories;
    }

    /// Look a story up in the shared list, then in the user's own subsets
    /// (which may hold stories the last fetch did not return).
    #[must_use]
    pub fn find_story(&self, id: &StoryId) -> Option<&Story> {
        self.stories.get(id).or_else(|| {
            self.user.as_ref().and_then(|user| {
                user.favorites()
                    .get(id)
                    .or_else(|| user.own_stories().get(id))
            })
        })
    }

    fn user_in(&mut self, epoch: u64) -> Option<&mut User> {
        if self.epoch == epoch {
            self.user.as_mut()
        } else {
            None
        }
    }

    /// Returns `false` when the user part was skipped.
    pub fn apply_story_added(&mut self, story: Story, epoch: u64) -> bool {
        self.stories.prepend(story.clone());
        match self.user_in(epoch) {
            Some(user) => {
                user.record_own_story(story);
                true
            }
            None => false,
        }
    }

    /// Returns `false` when the session changed since `epoch`.
    pub fn apply_story_removed(&mut self, id: &StoryId, epoch: u64) -> bool {
        self.stories.remove(id);
        if let Some(user) = self.user.as_mut() {
            user.forget_story(id);
        }
        self.epoch == epoch
    }

    /// Returns `false` when the change was discarded.
    pub fn apply_favorite(&mut self, story: Story, favorite: bool, epoch: u64) -> bool {
        let Some(user) = self.user_in(epoch) else {
            return false;
        };

        if favorite {
            user.record_favorite(story);
        } else {
            user.record_unfavorite(story.story_id());
        }
        true
    }

    #[must_use]
    pub fn is_visible(&self, view: View) -> bool {
        self.visible.contains(&view)
    }

    /// Make `view` the only visible list.
    pub fn show(&mut self, view: View) {
        self.visible.clear();
        self.visible.insert(view);
    }

    pub fn hide_all(&mut self) {
        self.visible.clear();
    }

    /// Rows for `view`, or an empty list when the view needs a user and
    /// nobody is logged in.
    #[must_use]
    pub fn rows(&self, view: View) -> Vec<StoryRow<'_>> {
        let user = self.user.as_ref();
        let stories: &StoryList = match (view, user) {
            (View::AllStories, _) => &self.stories,
            (View::OwnStories, Some(user)) => user.own_stories(),
            (View::Favorites, Some(user)) => user.favorites(),
            (_, None) => return Vec::new(),
        };

        stories
            .iter()
            .map(|story| StoryRow {
                story,
                host_name: story.host_name(),
                show_delete: view == View::OwnStories
                    && user.is_some_and(|u| u.is_own_story(story)),
                star: user.map(|u| Star::from_favorite(u.is_favorite(story))),
            })
            .collect()
    }
}
