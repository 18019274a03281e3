//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

pub mod shell;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::{AppConfig, AuthToken};

/// Storyboard - browse, submit and favorite stories on a shared story board.
#[derive(Parser, Debug)]
#[command(name = "storyboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: table, json, or markdown (overrides the config file).
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Path to the config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Story service base URL (overrides the config file).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credentials for commands that act as a user.
#[derive(Args, Debug, Default)]
pub struct AuthArgs {
    /// Username to act as.
    #[arg(short, long, env = "STORYBOARD_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password (prefer the environment variable).
    #[arg(long, env = "STORYBOARD_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Token from a previous login, used instead of the password.
    #[arg(long, env = "STORYBOARD_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,
}

/// How to authenticate, resolved from [`AuthArgs`].
#[derive(Debug, PartialEq, Eq)]
pub enum Login {
    Password { username: String, password: String },
    Token { username: String, token: AuthToken },
}

impl AuthArgs {
    /// A token wins over a password when both are given.
    #[must_use]
    pub fn login(&self) -> Option<Login> {
        let username = self.username.clone()?;
        if let Some(token) = &self.token {
            return Some(Login::Token {
                username,
                token: AuthToken::new(token.clone()),
            });
        }
        self.password.clone().map(|password| Login::Password { username, password })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all stories (newest first).
    Stories,

    /// List stories you submitted.
    Mine,

    /// List your favorite stories.
    Favorites,

    /// Submit a new story.
    Submit {
        #[arg(short, long)]
        title: String,

        #[arg(long)]
        url: String,

        #[arg(short, long)]
        author: String,
    },

    /// Delete one of your stories.
    Delete {
        /// Story ID.
        id: String,
    },

    /// Toggle a story in your favorites.
    Favorite {
        /// Story ID.
        id: String,
    },

    /// Log in and print a token for STORYBOARD_TOKEN.
    Login,

    /// Create an account and print a token for STORYBOARD_TOKEN.
    Signup {
        /// Display name.
        #[arg(short, long)]
        name: String,
    },

    /// Interactive session: browse, submit, delete and favorite.
    Shell,

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default config file if none exists.
    Init,

    /// Print the effective configuration.
    Show,

    /// Change settings and save them.
    Set {
        #[arg(long = "api-url")]
        api_url: Option<String>,

        #[arg(long)]
        timeout_secs: Option<u64>,

        #[arg(long = "default-format")]
        default_format: Option<String>,
    },
}

impl Cli {
    /// Parse the output format, falling back to the configured one.
    pub fn output_format(&self, config: &AppConfig) -> Result<OutputFormat, String> {
        self.format
            .as_deref()
            .unwrap_or(&config.display.format)
            .parse()
    }

    /// Apply command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.api.base_url.clone_from(base_url);
        }
    }
}
