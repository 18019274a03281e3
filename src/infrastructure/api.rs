//! Remote story service client.
//!
//! [`StoryApi`] is the seam between the synchronization core and the
//! network. [`HttpStoryApi`] talks to a Hack-or-Snooze style JSON service:
//!
//! | call            | request                                        |
//! |-----------------|------------------------------------------------|
//! | fetch stories   | `GET /stories`                                 |
//! | create story    | `POST /stories` `{token, story}`               |
//! | delete story    | `DELETE /stories/{id}` `{token}`               |
//! | favorite        | `POST /users/{name}/favorites/{id}` `{token}`  |
//! | unfavorite      | `DELETE /users/{name}/favorites/{id}` `{token}`|
//! | login / signup  | `POST /login`, `POST /signup` `{user}`         |
//! | resume session  | `GET /users/{name}?token=…`                    |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{ApiConfig, AppError, AuthToken, NewStory, Result, Story, StoryId, User};

/// The identity a remote call is made on behalf of.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: AuthToken,
}

impl From<&User> for Credentials {
    fn from(user: &User) -> Self {
        Self {
            username: user.username().to_string(),
            token: user.token().clone(),
        }
    }
}

/// A user as reported by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorites: Vec<Story>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

impl UserRecord {
    /// Build the session user from this record and its credential.
    #[must_use]
    pub fn into_user(self, token: AuthToken) -> User {
        User::new(self.username, self.name, token)
            .with_created_at(self.created_at)
            .with_stories(self.stories, self.favorites)
    }
}

/// Remote operations the synchronization core depends on.
#[async_trait]
pub trait StoryApi: Send + Sync {
    /// All stories, newest first.
    async fn fetch_stories(&self) -> Result<Vec<Story>>;

    /// Create a story; returns the service's canonical record.
    async fn create_story(&self, creds: &Credentials, story: &NewStory) -> Result<Story>;

    async fn delete_story(&self, creds: &Credentials, id: &StoryId) -> Result<()>;

    async fn add_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()>;

    async fn remove_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()>;

    async fn login(&self, username: &str, password: &str) -> Result<(UserRecord, AuthToken)>;

    async fn signup(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<(UserRecord, AuthToken)>;

    /// Re-read a user with an existing token.
    async fn fetch_user(&self, creds: &Credentials) -> Result<UserRecord>;
}

#[derive(Deserialize)]
struct StoriesResponse {
    stories: Vec<Story>,
}

#[derive(Deserialize)]
struct StoryResponse {
    story: Story,
}

#[derive(Deserialize)]
struct UserResponse {
    user: UserRecord,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    user: UserRecord,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct CreateStoryBody<'a> {
    token: &'a str,
    story: &'a NewStory,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    user: AuthUser<'a>,
}

#[derive(Serialize)]
struct AuthUser<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// HTTP implementation of [`StoryApi`].
pub struct HttpStoryApi {
    http: Client,
    base_url: Url,
}

impl HttpStoryApi {
    /// Create a client for the configured service.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| AppError::Config {
            message: format!("Invalid api.base_url '{}': {e}", config.base_url),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(AppError::Config {
                message: format!("api.base_url '{}' cannot be a base URL", config.base_url),
            });
        }

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(AppError::transport)?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn authenticate(&self, path: &str, user: AuthUser<'_>) -> Result<(UserRecord, AuthToken)> {
        let response = self
            .http
            .post(self.endpoint(&[path]))
            .json(&AuthBody { user })
            .send()
            .await
            .map_err(AppError::transport)?;

        let body: AuthResponse = check(response, None)
            .await?
            .json()
            .await
            .map_err(AppError::transport)?;

        Ok((body.user, AuthToken::new(body.token)))
    }
}

#[async_trait]
impl StoryApi for HttpStoryApi {
    async fn fetch_stories(&self) -> Result<Vec<Story>> {
        tracing::debug!("GET stories");

        let response = self
            .http
            .get(self.endpoint(&["stories"]))
            .send()
            .await
            .map_err(AppError::transport)?;

        let body: StoriesResponse = check(response, None)
            .await?
            .json()
            .await
            .map_err(AppError::transport)?;

        Ok(body.stories)
    }

    async fn create_story(&self, creds: &Credentials, story: &NewStory) -> Result<Story> {
        tracing::debug!(title = %story.title, "POST story");

        let response = self
            .http
            .post(self.endpoint(&["stories"]))
            .json(&CreateStoryBody {
                token: creds.token.expose(),
                story,
            })
            .send()
            .await
            .map_err(AppError::transport)?;

        let body: StoryResponse = check(response, None)
            .await?
            .json()
            .await
            .map_err(AppError::transport)?;

        Ok(body.story)
    }

    async fn delete_story(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        tracing::debug!(story_id = %id, "DELETE story");

        let response = self
            .http
            .delete(self.endpoint(&["stories", id.as_str()]))
            .json(&TokenBody {
                token: creds.token.expose(),
            })
            .send()
            .await
            .map_err(AppError::transport)?;

        check(response, Some(id)).await?;
        Ok(())
    }

    async fn add_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        tracing::debug!(story_id = %id, "POST favorite");

        let response = self
            .http
            .post(self.endpoint(&["users", creds.username.as_str(), "favorites", id.as_str()]))
            .json(&TokenBody {
                token: creds.token.expose(),
            })
            .send()
            .await
            .map_err(AppError::transport)?;

        check(response, Some(id)).await?;
        Ok(())
    }

    async fn remove_favorite(&self, creds: &Credentials, id: &StoryId) -> Result<()> {
        tracing::debug!(story_id = %id, "DELETE favorite");

        let response = self
            .http
            .delete(self.endpoint(&["users", creds.username.as_str(), "favorites", id.as_str()]))
            .json(&TokenBody {
                token: creds.token.expose(),
            })
            .send()
            .await
            .map_err(AppError::transport)?;

        check(response, Some(id)).await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<(UserRecord, AuthToken)> {
        self.authenticate(
            "login",
            AuthUser {
                username,
                password,
                name: None,
            },
        )
        .await
    }

    async fn signup(
        &self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<(UserRecord, AuthToken)> {
        self.authenticate(
            "signup",
            AuthUser {
                username,
                password,
                name: Some(name),
            },
        )
        .await
    }

    async fn fetch_user(&self, creds: &Credentials) -> Result<UserRecord> {
        let response = self
            .http
            .get(self.endpoint(&["users", creds.username.as_str()]))
            .query(&[("token", creds.token.expose())])
            .send()
            .await
            .map_err(AppError::transport)?;

        let body: UserResponse = check(response, None)
            .await?
            .json()
            .await
            .map_err(AppError::transport)?;

        Ok(body.user)
    }
}

/// Pass successful responses through; turn failure statuses into errors.
async fn check(response: Response, story_id: Option<&StoryId>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    tracing::debug!(status = status.as_u16(), %message, "Request failed");

    Err(status_error(status, message, story_id))
}

/// Map a failure status to the error kind the core distinguishes.
fn status_error(status: StatusCode, message: String, story_id: Option<&StoryId>) -> AppError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => AppError::Validation { message },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth { message },
        StatusCode::NOT_FOUND => match story_id {
            Some(id) => AppError::not_found(id),
            None => AppError::Auth { message },
        },
        _ => AppError::Transport {
            message,
            source: None,
        },
    }
}

/// Extract `error.message` from a service error body, if present.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}
