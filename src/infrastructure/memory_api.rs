//! In-memory story service used by tests.
//!
//! Behaves like the HTTP service (ownership checks, cascading favorite
//! cleanup, server-assigned ids) and adds two test hooks: queued failures
//! and a pause that holds the next call open until released.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::{AppError, AuthToken, NewStory, Result, Story, StoryId};

use super::api::{Credentials, StoryApi, UserRecord};

/// Error to inject into the next remote call.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Auth,
    NotFound,
    Transport,
}

/// Handles for a paused call.
pub struct PausedCall {
    /// Resolves once the paused call has started.
    pub entered: oneshot::Receiver<()>,
    /// Send to let the paused call continue.
    pub release: oneshot::Sender<()>,
}

struct Account {
    password: String,
    name: String,
    token: String,
    favorites: BTreeSet<StoryId>,
}

#[derive(Default)]
struct State {
    stories: Vec<Story>,
    accounts: HashMap<String, Account>,
    next_id: usize,
    calls: usize,
    failures: VecDeque<Failure>,
    pause: Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>,
}

#[derive(Default)]
pub struct MemoryStoryApi {
    state: Mutex<State>,
}

impl MemoryStoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; its token is `token-{username}`.
    pub fn with_account(self, username: &str, password: &str) -> Self {
        self.lock().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                name: username.to_string(),
                token: format!("token-{username}"),
                favorites: BTreeSet::new(),
            },
        );
        self
    }

    /// Seed a story as if another client had posted it. Newest first.
    pub fn with_story(self, id: &str, username: &str) -> Self {
        let story = Story::new(
            id,
            format!("Story {id}"),
            "Someone",
            format!("http://example.com/{id}"),
            username,
        );
        self.lock().stories.insert(0, story);
        self
    }

    pub fn fail_next(&self, failure: Failure) {
        self.lock().failures.push_back(failure);
    }

    /// Hold the next remote call open until the returned sender fires.
    pub fn pause_next(&self) -> PausedCall {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.lock().pause = Some((entered_tx, release_rx));
        PausedCall {
            entered: entered_rx,
            release: release_tx,
        }
    }

    /// Number of remote calls received so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Delete a story directly, as another session would.
    pub fn remove_remotely(&self, id: &str) {
        let id = StoryId::new(id);
        let mut state = self.lock();
        state.stories.retain(|s| s.story_id() != &id);
        for account in state.accounts.values_mut() {
            account.favorites.remove(&id);
        }
    }

    /// Favorites as the service sees them.
    pub fn favorites_of(&self, username: &str) -> Vec<StoryId> {
        self.lock()
            .accounts
            .get(username)
            .map(|a| a.favorites.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, apply a queued failure, and honour a pending pause.
    async fn begin(&self) -> Result<()> {
        let (failure, pause) = {
            let mut state = self.lock();
            state.calls += 1;
            (state.failures.pop_front(), state.pause.take())
        };

        if let Some((entered, release)) = pause {
            let _ = entered.send(());
            let _ = release.await;
        }

        match failure {
            None => Ok(()),
            Some(Failure::Auth) => Err(AppError::auth("injected auth failure")),
            Some(Failure::NotFound) => Err(AppError::not_found("injected")),
            Some(Failure::Transport) => Err(AppError::Transport {
                message: "injected transport failure".to_string(),
                source: None,
            }),
        }
    }

    fn record(state: &State, username: &str) -> Option<UserRecord> {
        let account = state.accounts.get(username)?;
        Some(UserRecord {
            username: username.to_string(),
            name: account.name.clone(),
            created_at: None,
            favorites: state
                .stories
                .iter()
                .filter(|s| account.favorites.contains(s.story_id()))
                .cloned()
                .collect(),
            stories: state
                .stories
                .iter()
                .filter(|s| s.username() == username)
                .cloned()
                .collect(),
        })
    }
}

fn authorize<'a>(state: &'a State, creds: &Credentials) -> Result<&'a Account> {
    state
        .accounts
        .get(&creds.username)
        .filter(|a| a.token == creds.token.expose())
        .ok_or_else(|| AppError::auth("invalid token"))
}

#[async_trait]
impl StoryApi for MemoryStoryApi {
    async fn fetch_stories(&self) -> Result<Vec<Story>> {
        self.begin().await?;
        Ok(self.lock().stories.clone())
    }

    async fn create_story(&self, creds: &Credentials, story: &NewStory) -> Result<Story> {
        self.begin().await?;
        let mut state = self.lock();
        authorize(&state, creds)?;
        if story.validate().is_err() {
            return Err(AppError::validation("bad story"));
        }

        state.next_id += 1;
        let created = Story::new(
            format!("story-{}", state.next_id),
            story.title.clone(),
            story.author.clone(),
            story.url.clone(),
            creds.username.clone(),
        );
        state.stories.insert(0, created.clone());
        Ok(created)
    }

    async fn delete_story(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        self.begin().await?;
        let mut state = self.lock();
        authorize(&state, creds)?;

        let story = state
            .stories
            .iter()
            .find(|s| s.story_id() == id)
            .ok_or_else(|| AppError::not_found(id))?;
        if story.username() != creds.username {
            return Err(AppError::auth("only the owner can delete a story"));
        }

        state.stories.retain(|s| s.story_id() != id);
        for account in state.accounts.values_mut() {
            account.favorites.remove(id);
        }
        Ok(())
    }

    async fn add_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        self.begin().await?;
        let mut state = self.lock();
        authorize(&state, creds)?;
        if !state.stories.iter().any(|s| s.story_id() == id) {
            return Err(AppError::not_found(id));
        }
        if let Some(account) = state.accounts.get_mut(&creds.username) {
            account.favorites.insert(id.clone());
        }
        Ok(())
    }

    async fn remove_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        self.begin().await?;
        let mut state = self.lock();
        authorize(&state, creds)?;
        if !state.stories.iter().any(|s| s.story_id() == id) {
            return Err(AppError::not_found(id));
        }
        if let Some(account) = state.accounts.get_mut(&creds.username) {
            account.favorites.remove(id);
        }
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<(UserRecord, AuthToken)> {
        self.begin().await?;
        let state = self.lock();
        let account = state
            .accounts
            .get(username)
            .filter(|a| a.password == password)
            .ok_or_else(|| AppError::auth("invalid credentials"))?;
        let token = AuthToken::new(account.token.clone());
        let record = Self::record(&state, username).ok_or_else(|| AppError::auth("no account"))?;
        Ok((record, token))
    }

    async fn signup(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<(UserRecord, AuthToken)> {
        self.begin().await?;
        let mut state = self.lock();
        if state.accounts.contains_key(username) {
            return Err(AppError::validation("username taken"));
        }
        let token = format!("token-{username}");
        state.accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                name: name.to_string(),
                token: token.clone(),
                favorites: BTreeSet::new(),
            },
        );
        let record = Self::record(&state, username).ok_or_else(|| AppError::auth("no account"))?;
        Ok((record, AuthToken::new(token)))
    }

    async fn fetch_user(&self, creds: &Credentials) -> Result<UserRecord> {
        self.begin().await?;
        let state = self.lock();
        authorize(&state, creds)?;
        Self::record(&state, &creds.username).ok_or_else(|| AppError::auth("no account"))
    }
}
