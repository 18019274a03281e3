//! Orchestrates user intents against the story service and keeps the
//! session model and visible lists consistent with what the service
//! confirmed.
//!
//! Each action runs `Idle -> Requesting -> Applied | Failed` on its own.
//! The session lock is never held across a request; a confirmed result is
//! applied and the affected visible lists re-rendered inside one critical
//! section. Actions on the same story (delete, favorite) are serialized
//! through a per-story gate so they cannot race to conflicting outcomes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{AppError, AuthToken, NewStory, Result, Story, StoryId, User};
use crate::infrastructure::{Credentials, StoryApi};

use super::render::{Renderer, View};
use super::session::Session;
use super::story_service::StoryService;

/// How a confirmed action ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The result was applied to the session.
    Applied(T),
    /// The user logged out (or someone else logged in) while the request
    /// was in flight; nothing was added to the current user's subsets.
    Superseded,
}

/// UI intents, one per user-facing action.
#[derive(Clone)]
pub enum Intent {
    Refresh,
    Show(View),
    Hide,
    Submit(NewStory),
    Delete(StoryId),
    ToggleFavorite(StoryId),
    SetFavorite(StoryId, bool),
    Login { username: String, password: String },
    Signup {
        username: String,
        password: String,
        name: String,
    },
    Resume { username: String, token: AuthToken },
    Logout,
}

impl Intent {
    /// Short label for logs; never includes credentials.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Show(_) => "show",
            Self::Hide => "hide",
            Self::Submit(_) => "submit",
            Self::Delete(_) => "delete",
            Self::ToggleFavorite(_) => "toggle-favorite",
            Self::SetFavorite(..) => "set-favorite",
            Self::Login { .. } => "login",
            Self::Signup { .. } => "signup",
            Self::Resume { .. } => "resume",
            Self::Logout => "logout",
        }
    }
}

/// What the UI should tell the user after an intent completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Refreshed(usize),
    Showing(View),
    Hidden,
    Submitted(Story),
    Deleted(StoryId),
    Favorited(StoryId),
    Unfavorited(StoryId),
    LoggedIn(String),
    LoggedOut,
    NotLoggedIn,
    Superseded,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refreshed(count) => write!(f, "Loaded {count} stories"),
            Self::Showing(view) => write!(f, "Showing {view}"),
            Self::Hidden => write!(f, "Lists hidden"),
            Self::Submitted(story) => {
                write!(f, "Submitted \"{}\" ({})", story.title(), story.story_id())
            }
            Self::Deleted(id) => write!(f, "Deleted story {id}"),
            Self::Favorited(id) => write!(f, "Added {id} to favorites"),
            Self::Unfavorited(id) => write!(f, "Removed {id} from favorites"),
            Self::LoggedIn(username) => write!(f, "Logged in as {username}"),
            Self::LoggedOut => write!(f, "Logged out"),
            Self::NotLoggedIn => write!(f, "Not logged in"),
            Self::Superseded => write!(f, "Session changed before the request finished"),
        }
    }
}

pub struct SyncController {
    service: StoryService,
    renderer: Arc<dyn Renderer>,
    session: Mutex<Session>,
    gates: GateMap,
}

impl SyncController {
    #[must_use]
    pub fn new(api: Arc<dyn StoryApi>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            service: StoryService::new(api),
            renderer,
            session: Mutex::new(Session::default()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Run one intent through the matching action.
    ///
    /// # Errors
    /// Whatever the underlying action reports.
    pub async fn dispatch(&self, intent: Intent) -> Result<Notice> {
        tracing::debug!(intent = intent.name(), "Dispatching intent");

        let notice = match intent {
            Intent::Refresh => Notice::Refreshed(self.refresh().await?),
            Intent::Show(view) => {
                self.show(view)?;
                Notice::Showing(view)
            }
            Intent::Hide => {
                self.hide_all();
                Notice::Hidden
            }
            Intent::Submit(story) => match self.submit_story(story).await? {
                Outcome::Applied(story) => Notice::Submitted(story),
                Outcome::Superseded => Notice::Superseded,
            },
            Intent::Delete(id) => match self.delete_story(&id).await? {
                Outcome::Applied(()) => Notice::Deleted(id),
                Outcome::Superseded => Notice::Superseded,
            },
            Intent::ToggleFavorite(id) => {
                favorite_notice(id.clone(), self.toggle_favorite(&id).await?)
            }
            Intent::SetFavorite(id, favorite) => {
                favorite_notice(id.clone(), self.set_favorite(&id, favorite).await?)
            }
            Intent::Login { username, password } => {
                Notice::LoggedIn(self.login(&username, &password).await?)
            }
            Intent::Signup {
                username,
                password,
                name,
            } => Notice::LoggedIn(self.signup(&username, &password, &name).await?),
            Intent::Resume { username, token } => {
                Notice::LoggedIn(self.resume(&username, token).await?)
            }
            Intent::Logout => {
                if self.logout() {
                    Notice::LoggedOut
                } else {
                    Notice::NotLoggedIn
                }
            }
        };

        Ok(notice)
    }

    /// Replace the story list with a fresh fetch. On failure the previous
    /// list stays in place.
    ///
    /// # Errors
    /// Whatever the service reports.
    pub async fn refresh(&self) -> Result<usize> {
        let list = self
            .service
            .fetch_all()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Story fetch failed"))?;
        let count = list.len();

        let mut session = self.lock();
        session.replace_stories(list);
        self.render_visible(&session, &[View::AllStories]);

        Ok(count)
    }

    /// Submit a story; on confirmation it goes to the head of the list and
    /// into the user's own stories.
    ///
    /// # Errors
    /// `Auth` when nobody is logged in, otherwise whatever the service reports.
    pub async fn submit_story(&self, story: NewStory) -> Result<Outcome<Story>> {
        let (creds, epoch) = self.credentials()?;

        let created = self
            .service
            .add_story(&creds, &story)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Story submit failed"))?;

        let mut session = self.lock();
        let applied = session.apply_story_added(created.clone(), epoch);
        self.render_visible(&session, &[View::AllStories, View::OwnStories]);

        Ok(outcome(applied, created))
    }

    /// Delete a story; on confirmation it is removed from the list and from
    /// the user's own stories and favorites.
    ///
    /// # Errors
    /// `Auth` when nobody is logged in or the user is not the owner,
    /// `NotFound`, `Transport`.
    pub async fn delete_story(&self, id: &StoryId) -> Result<Outcome<()>> {
        let _gate = self.gate(id).await;
        let (creds, epoch) = self.credentials()?;

        self.service
            .remove_story(&creds, id)
            .await
            .inspect_err(|e| tracing::warn!(story_id = %id, error = %e, "Story delete failed"))?;

        let mut session = self.lock();
        let applied = session.apply_story_removed(id, epoch);
        self.render_visible(&session, &View::ALL);

        Ok(outcome(applied, ()))
    }

    /// Flip the favorite state of a story based on the confirmed local
    /// membership. Returns the new state.
    ///
    /// # Errors
    /// `NotFound` when the story is no longer known (e.g. deleted while this
    /// toggle waited), otherwise as for [`Self::set_favorite`].
    pub async fn toggle_favorite(&self, id: &StoryId) -> Result<Outcome<bool>> {
        self.change_favorite(id, |current| !current).await
    }

    /// Make the favorite state of a story `favorite`. No request is made
    /// when it already is.
    ///
    /// # Errors
    /// `Auth` when nobody is logged in, `NotFound`, `Transport`.
    pub async fn set_favorite(&self, id: &StoryId, favorite: bool) -> Result<Outcome<bool>> {
        self.change_favorite(id, |_| favorite).await
    }

    async fn change_favorite(
        &self,
        id: &StoryId,
        decide: impl FnOnce(bool) -> bool + Send,
    ) -> Result<Outcome<bool>> {
        let _gate = self.gate(id).await;

        let (creds, epoch, story, current) = {
            let session = self.lock();
            let user = session.user().ok_or_else(login_required)?;
            let story = session
                .find_story(id)
                .cloned()
                .ok_or_else(|| AppError::not_found(id))?;
            let current = user.is_favorite(&story);
            (Credentials::from(user), session.epoch(), story, current)
        };

        let wanted = decide(current);
        if wanted == current {
            return Ok(Outcome::Applied(current));
        }

        let result = if wanted {
            self.service.add_favorite(&creds, &story).await
        } else {
            self.service.remove_favorite(&creds, &story).await
        };
        result.inspect_err(|e| tracing::warn!(story_id = %id, error = %e, "Favorite change failed"))?;

        let mut session = self.lock();
        let applied = session.apply_favorite(story, wanted, epoch);
        if applied {
            self.render_visible(&session, &View::ALL);
        }

        Ok(outcome(applied, wanted))
    }

    /// # Errors
    /// `Validation` or `Auth`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self.service.login(username, password).await?;
        Ok(self.begin_session(user))
    }

    /// # Errors
    /// `Validation` (including a taken username) or `Transport`.
    pub async fn signup(&self, username: &str, password: &str, name: &str) -> Result<String> {
        let user = self.service.signup(username, password, name).await?;
        Ok(self.begin_session(user))
    }

    /// # Errors
    /// `Auth` when the token is no longer valid.
    pub async fn resume(&self, username: &str, token: AuthToken) -> Result<String> {
        let user = self.service.resume(username, token).await?;
        Ok(self.begin_session(user))
    }

    /// End the current session. Returns `false` when nobody was logged in.
    pub fn logout(&self) -> bool {
        let mut session = self.lock();
        let ended = session.end();
        if let Some(user) = &ended {
            tracing::info!(username = user.username(), "Logged out");
        }
        self.render_visible(&session, &[View::AllStories]);
        ended.is_some()
    }

    /// Make `view` the only visible list and draw it.
    ///
    /// # Errors
    /// `Auth` for own stories or favorites when nobody is logged in.
    pub fn show(&self, view: View) -> Result<()> {
        let mut session = self.lock();
        if view.requires_user() && session.user().is_none() {
            return Err(login_required());
        }
        session.show(view);
        self.render_visible(&session, &[view]);
        Ok(())
    }

    pub fn hide_all(&self) {
        self.lock().hide_all();
    }

    /// Read the session under the lock.
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.with_session(|s| s.user().map(|u| u.token().clone()))
    }

    fn begin_session(&self, user: User) -> String {
        let username = user.username().to_string();
        let mut session = self.lock();
        session.begin(user);
        tracing::info!(%username, "Logged in");
        self.render_visible(&session, &View::ALL);
        username
    }

    fn credentials(&self) -> Result<(Credentials, u64)> {
        let session = self.lock();
        let user = session.user().ok_or_else(login_required)?;
        Ok((Credentials::from(user), session.epoch()))
    }

    fn render_visible(&self, session: &Session, views: &[View]) {
        for &view in views {
            if session.is_visible(view) {
                self.renderer.render(view, &session.rows(view));
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn gate(&self, id: &StoryId) -> StoryGate<'_> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(id.clone()).or_default())
        };
        StoryGate {
            gates: &self.gates,
            id: id.clone(),
            guard: Some(gate.lock_owned().await),
        }
    }
}

type GateMap = Mutex<HashMap<StoryId, Arc<AsyncMutex<()>>>>;

/// Exclusive hold on one story for the length of an action. The map entry
/// is dropped with the last holder, so gates only exist while in use.
struct StoryGate<'a> {
    gates: &'a GateMap,
    id: StoryId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for StoryGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits on it.
        if gates
            .get(&self.id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&self.id);
        }
    }
}

fn login_required() -> AppError {
    AppError::auth("login required")
}

fn favorite_notice(id: StoryId, outcome: Outcome<bool>) -> Notice {
    match outcome {
        Outcome::Applied(true) => Notice::Favorited(id),
        Outcome::Applied(false) => Notice::Unfavorited(id),
        Outcome::Superseded => Notice::Superseded,
    }
}

fn outcome<T>(applied: bool, value: T) -> Outcome<T> {
    if applied {
        Outcome::Applied(value)
    } else {
        tracing::warn!("Session ended before the request completed; result discarded");
        Outcome::Superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::{Star, StoryRow};
    use crate::infrastructure::memory_api::{Failure, MemoryStoryApi};

    /// Captures every render call as (view, [(id, star)]).
    #[derive(Default)]
    struct RecordingRenderer {
        frames: Mutex<Vec<(View, Vec<(String, Option<Star>)>)>>,
    }

    impl RecordingRenderer {
        fn frames(&self) -> Vec<(View, Vec<(String, Option<Star>)>)> {
            self.frames.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.frames.lock().unwrap().clear();
        }
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, view: View, rows: &[StoryRow<'_>]) {
            let rows = rows
                .iter()
                .map(|r| (r.story.story_id().to_string(), r.star))
                .collect();
            self.frames.lock().unwrap().push((view, rows));
        }
    }

    struct Harness {
        api: Arc<MemoryStoryApi>,
        renderer: Arc<RecordingRenderer>,
        controller: SyncController,
    }

    async fn harness(api: MemoryStoryApi) -> Harness {
        let api = Arc::new(api.with_account("alice", "pw").with_account("bob", "pw"));
        let renderer = Arc::new(RecordingRenderer::default());
        let controller = SyncController::new(api.clone(), renderer.clone());
        controller.refresh().await.unwrap();
        controller.login("alice", "pw").await.unwrap();
        Harness {
            api,
            renderer,
            controller,
        }
    }

    fn ids(h: &Harness) -> Vec<String> {
        h.controller
            .with_session(|s| s.stories().iter().map(|st| st.story_id().to_string()).collect())
    }

    fn own_ids(h: &Harness) -> Vec<String> {
        h.controller.with_session(|s| {
            s.user()
                .unwrap()
                .own_stories()
                .iter()
                .map(|st| st.story_id().to_string())
                .collect()
        })
    }

    fn is_favorite(h: &Harness, id: &str) -> bool {
        h.controller
            .with_session(|s| s.user().unwrap().is_favorite_id(&StoryId::new(id)))
    }

    #[tokio::test]
    async fn test_submit_into_empty_collection() {
        let h = harness(MemoryStoryApi::new()).await;
        assert!(ids(&h).is_empty());

        let outcome = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap();

        let Outcome::Applied(story) = outcome else {
            panic!("submit was not applied");
        };
        assert_eq!(story.title(), "A");
        assert_eq!(story.url(), "http://example.com/a");
        assert_eq!(story.author(), "X");
        assert_eq!(story.username(), "alice");

        h.controller.with_session(|s| {
            assert_eq!(s.stories().stories(), std::slice::from_ref(&story));
            assert_eq!(
                s.user().unwrap().own_stories().get(story.story_id()),
                Some(&story)
            );
        });
    }

    #[tokio::test]
    async fn test_submit_then_delete_restores_state() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let before = (ids(&h), own_ids(&h));

        let Outcome::Applied(story) = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap()
        else {
            panic!("submit was not applied");
        };
        assert_eq!(ids(&h)[0], story.story_id().to_string());

        h.controller.delete_story(story.story_id()).await.unwrap();
        assert_eq!((ids(&h), own_ids(&h)), before);
    }

    #[tokio::test]
    async fn test_submit_validation_and_login_required() {
        let h = harness(MemoryStoryApi::new()).await;
        let calls = h.api.calls();

        let err = h
            .controller
            .submit_story(NewStory::new("A", "", "X"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(h.api.calls(), calls);

        h.controller.logout();
        let err = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let id = StoryId::new("s1");

        assert_eq!(
            h.controller.toggle_favorite(&id).await.unwrap(),
            Outcome::Applied(true)
        );
        assert!(is_favorite(&h, "s1"));
        assert_eq!(h.api.favorites_of("alice"), vec![id.clone()]);

        assert_eq!(
            h.controller.toggle_favorite(&id).await.unwrap(),
            Outcome::Applied(false)
        );
        assert!(!is_favorite(&h, "s1"));
        assert!(h.api.favorites_of("alice").is_empty());
    }

    #[tokio::test]
    async fn test_failed_favorite_leaves_state_and_skips_render() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let id = StoryId::new("s1");
        h.controller.show(View::AllStories).unwrap();
        h.renderer.clear();

        h.api.fail_next(Failure::Transport);
        let err = h.controller.toggle_favorite(&id).await.unwrap_err();
        assert!(matches!(err, AppError::Transport { .. }));
        assert!(!is_favorite(&h, "s1"));
        assert!(h.renderer.frames().is_empty());

        h.controller.toggle_favorite(&id).await.unwrap();
        h.api.fail_next(Failure::Auth);
        let err = h.controller.toggle_favorite(&id).await.unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));
        assert!(is_favorite(&h, "s1"));
    }

    #[tokio::test]
    async fn test_set_favorite_is_idempotent() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let id = StoryId::new("s1");

        h.controller.set_favorite(&id, true).await.unwrap();
        let calls = h.api.calls();
        assert_eq!(
            h.controller.set_favorite(&id, true).await.unwrap(),
            Outcome::Applied(true)
        );
        assert_eq!(h.api.calls(), calls);
    }

    #[tokio::test]
    async fn test_delete_favorited_story_removes_favorite() {
        let h = harness(MemoryStoryApi::new()).await;
        let Outcome::Applied(story) = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap()
        else {
            panic!("submit was not applied");
        };
        let id = story.story_id().clone();
        h.controller.toggle_favorite(&id).await.unwrap();
        assert!(is_favorite(&h, id.as_str()));

        h.controller.delete_story(&id).await.unwrap();

        assert!(!is_favorite(&h, id.as_str()));
        h.controller
            .with_session(|s| assert!(s.user().unwrap().favorites().is_empty()));
    }

    #[tokio::test]
    async fn test_delete_errors_leave_state() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let before = ids(&h);

        let err = h.controller.delete_story(&StoryId::new("s1")).await.unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));

        let err = h
            .controller
            .delete_story(&StoryId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        assert_eq!(ids(&h), before);
    }

    #[tokio::test]
    async fn test_toggle_queued_behind_delete_is_not_found() {
        let h = harness(MemoryStoryApi::new()).await;
        let Outcome::Applied(story) = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap()
        else {
            panic!("submit was not applied");
        };
        let id = story.story_id().clone();
        let calls = h.api.calls();

        let paused = h.api.pause_next();
        let (deleted, toggled, ()) = tokio::join!(
            h.controller.delete_story(&id),
            h.controller.toggle_favorite(&id),
            async {
                paused.entered.await.unwrap();
                paused.release.send(()).unwrap();
            }
        );

        assert_eq!(deleted.unwrap(), Outcome::Applied(()));
        assert!(matches!(toggled, Err(AppError::NotFound { .. })));
        // Only the delete reached the service.
        assert_eq!(h.api.calls(), calls + 1);
        assert!(!is_favorite(&h, id.as_str()));
        assert!(h.controller.gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_confirmed_after_relogin_clears_new_user() {
        let h = harness(MemoryStoryApi::new()).await;
        let Outcome::Applied(story) = h
            .controller
            .submit_story(NewStory::new("A", "http://example.com/a", "X"))
            .await
            .unwrap()
        else {
            panic!("submit was not applied");
        };
        let id = story.story_id().clone();
        h.controller.toggle_favorite(&id).await.unwrap();

        let paused = h.api.pause_next();
        let (deleted, ()) = tokio::join!(h.controller.delete_story(&id), async {
            paused.entered.await.unwrap();
            assert!(h.controller.logout());
            h.controller.login("alice", "pw").await.unwrap();
            // The service has not deleted it yet, so the new user starts with it.
            assert!(is_favorite(&h, id.as_str()));
            paused.release.send(()).unwrap();
        });

        assert_eq!(deleted.unwrap(), Outcome::Superseded);
        assert!(!ids(&h).contains(&id.to_string()));
        assert!(!own_ids(&h).contains(&id.to_string()));
        assert!(!is_favorite(&h, id.as_str()));
    }

    #[tokio::test]
    async fn test_gates_are_dropped_after_each_action() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        let id = StoryId::new("s1");

        h.controller.toggle_favorite(&id).await.unwrap();
        assert!(h.controller.gates.lock().unwrap().is_empty());

        // Not the owner: the delete fails and still releases its gate.
        let err = h.controller.delete_story(&id).await.unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));
        assert!(h.controller.gates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_not_found_on_favorite_leaves_state() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        h.api.fail_next(Failure::NotFound);

        let err = h
            .controller
            .toggle_favorite(&StoryId::new("s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(!is_favorite(&h, "s1"));
        assert!(h.api.favorites_of("alice").is_empty());
    }

    #[tokio::test]
    async fn test_distinct_stories_run_concurrently() {
        let h = harness(
            MemoryStoryApi::new()
                .with_story("s1", "bob")
                .with_story("s2", "bob"),
        )
        .await;

        let (s1, s2) = (StoryId::new("s1"), StoryId::new("s2"));
        let paused = h.api.pause_next();
        let (first, second) = tokio::join!(
            h.controller.toggle_favorite(&s1),
            async {
                paused.entered.await.unwrap();
                // s1 is still in flight; s2 is not blocked by it.
                let second = h.controller.toggle_favorite(&s2).await;
                paused.release.send(()).unwrap();
                second
            }
        );

        assert_eq!(first.unwrap(), Outcome::Applied(true));
        assert_eq!(second.unwrap(), Outcome::Applied(true));
        assert!(is_favorite(&h, "s1") && is_favorite(&h, "s2"));
    }

    #[tokio::test]
    async fn test_completion_after_logout_is_discarded() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;

        let id = StoryId::new("s1");
        let paused = h.api.pause_next();
        let (toggled, ()) = tokio::join!(h.controller.toggle_favorite(&id), async {
            paused.entered.await.unwrap();
            assert!(h.controller.logout());
            paused.release.send(()).unwrap();
        });

        assert_eq!(toggled.unwrap(), Outcome::Superseded);
        h.controller.with_session(|s| assert!(s.user().is_none()));

        // A new login sees what the service recorded.
        h.controller.login("alice", "pw").await.unwrap();
        assert!(is_favorite(&h, "s1"));
    }

    #[tokio::test]
    async fn test_toggle_on_story_deleted_elsewhere() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        h.api.remove_remotely("s1");

        let err = h
            .controller
            .toggle_favorite(&StoryId::new("s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(!is_favorite(&h, "s1"));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        h.api.fail_next(Failure::Transport);

        assert!(h.controller.refresh().await.is_err());
        assert_eq!(ids(&h), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_only_visible_views_rerender() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        h.controller.show(View::Favorites).unwrap();
        h.renderer.clear();

        h.controller.toggle_favorite(&StoryId::new("s1")).await.unwrap();

        let frames = h.renderer.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, View::Favorites);
        assert_eq!(frames[0].1, vec![("s1".to_string(), Some(Star::Filled))]);
    }

    #[tokio::test]
    async fn test_logout_hides_stars_and_user_views() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;
        h.controller.show(View::AllStories).unwrap();
        h.renderer.clear();

        h.controller.logout();
        let frames = h.renderer.frames();
        assert_eq!(frames, vec![(View::AllStories, vec![("s1".to_string(), None)])]);

        let err = h.controller.show(View::OwnStories).unwrap_err();
        assert!(matches!(err, AppError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_table() {
        let h = harness(MemoryStoryApi::new().with_story("s1", "bob")).await;

        let notice = h
            .controller
            .dispatch(Intent::ToggleFavorite(StoryId::new("s1")))
            .await
            .unwrap();
        assert_eq!(notice, Notice::Favorited(StoryId::new("s1")));

        let notice = h.controller.dispatch(Intent::Show(View::Favorites)).await.unwrap();
        assert_eq!(notice, Notice::Showing(View::Favorites));

        let notice = h
            .controller
            .dispatch(Intent::SetFavorite(StoryId::new("s1"), false))
            .await
            .unwrap();
        assert_eq!(notice, Notice::Unfavorited(StoryId::new("s1")));
        assert!(!is_favorite(&h, "s1"));

        assert_eq!(h.controller.dispatch(Intent::Hide).await.unwrap(), Notice::Hidden);
        h.renderer.clear();
        h.controller.dispatch(Intent::Refresh).await.unwrap();
        assert!(h.renderer.frames().is_empty());

        assert_eq!(
            h.controller.dispatch(Intent::Logout).await.unwrap(),
            Notice::LoggedOut
        );
        assert_eq!(
            h.controller.dispatch(Intent::Logout).await.unwrap(),
            Notice::NotLoggedIn
        );

        let notice = h
            .controller
            .dispatch(Intent::Resume {
                username: "alice".to_string(),
                token: AuthToken::new("token-alice"),
            })
            .await
            .unwrap();
        assert_eq!(notice, Notice::LoggedIn("alice".to_string()));
    }
}
