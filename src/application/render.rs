//! The contract between the synchronization core and whatever draws lists.
//!
//! The core decides *what* a list shows (which stories, which controls);
//! a [`Renderer`] decides how it looks.

use serde::Serialize;

use crate::domain::Story;

/// A story list the user can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    AllStories,
    OwnStories,
    Favorites,
}

impl View {
    pub const ALL: [Self; 3] = [Self::AllStories, Self::OwnStories, Self::Favorites];

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::AllStories => "All stories",
            Self::OwnStories => "My stories",
            Self::Favorites => "Favorites",
        }
    }

    /// Placeholder shown instead of an empty list.
    #[must_use]
    pub const fn empty_message(self) -> &'static str {
        match self {
            Self::AllStories => "No stories yet!",
            Self::OwnStories => "No stories added by user yet!",
            Self::Favorites => "No favorite stories added yet!",
        }
    }

    /// Own stories and favorites only exist while someone is logged in.
    #[must_use]
    pub const fn requires_user(self) -> bool {
        matches!(self, Self::OwnStories | Self::Favorites)
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Favorite marker state for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Star {
    Filled,
    Empty,
}

impl Star {
    #[must_use]
    pub const fn from_favorite(favorite: bool) -> Self {
        if favorite {
            Self::Filled
        } else {
            Self::Empty
        }
    }

    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Filled => "★",
            Self::Empty => "☆",
        }
    }
}

/// Everything a renderer needs for one story in one list.
#[derive(Debug, Clone, Serialize)]
pub struct StoryRow<'a> {
    pub story: &'a Story,
    /// Derived from the story URL; empty when the URL is malformed.
    pub host_name: String,
    /// Owner-only delete control.
    pub show_delete: bool,
    /// `None` when nobody is logged in.
    pub star: Option<Star>,
}

/// Draws a story list.
pub trait Renderer: Send + Sync {
    fn render(&self, view: View, rows: &[StoryRow<'_>]);
}
